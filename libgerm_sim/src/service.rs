//! The emulator service: socket threads feeding one event loop.
//!
//! Each endpoint gets its own named thread that only deals with transport framing. Everything
//! that touches state (registers, run counter, arming, subscribers, the data link) happens in the
//! loop, one inbound message at a time. A triggered run blocks the loop until it completes, so
//! commands and arm requests arriving meanwhile wait their turn.
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::mpsc::{self, Receiver, Sender};

use super::arming::{ArmRequest, ArmingSession};
use super::broadcast::Broadcaster;
use super::command::{encode_triples, read_frame, reply_count, write_frame, Triple};
use super::config::Config;
use super::dispatcher::CommandDispatcher;
use super::error::ServiceError;
use super::link::{DataLink, DatagramSender};
use super::run::RunContext;
use super::run_status::RunStatus;
use super::simulator::{EventSource, Simulator};

/// Largest datagram accepted on the UDP endpoints. Longer datagrams are truncated
const MAX_DATAGRAM_SIZE: usize = 1500;

/// A message forwarded by the socket threads to the event loop
#[derive(Debug)]
pub enum Inbound {
    /// Raw control request and where to send its reply
    Command {
        request: Vec<u8>,
        reply: Sender<Triple>,
    },
    /// Raw datagram received on the arm endpoint
    Arm { datagram: Vec<u8>, from: SocketAddr },
    /// A new broadcast subscriber
    Subscriber(TcpStream),
}

/// Service holds all of the emulator state and handles inbound messages in order
pub struct Service<E, S> {
    dispatcher: CommandDispatcher,
    session: ArmingSession,
    broadcaster: Broadcaster,
    link: DataLink<S>,
    source: E,
    status: Option<Sender<RunStatus>>,
}

impl<E: EventSource, S: DatagramSender> Service<E, S> {
    /// Create an unarmed service with empty registers. Arm acknowledgments and data frames both
    /// leave through `sender`
    pub fn new(source: E, sender: S, data_port: u16, status: Option<Sender<RunStatus>>) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(),
            session: ArmingSession::new(data_port),
            broadcaster: Broadcaster::new(),
            link: DataLink::new(sender),
            source,
            status,
        }
    }

    pub fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Command { request, reply } => self.handle_command(&request, &reply),
            Inbound::Arm { datagram, from } => self.handle_arm(&datagram, from),
            Inbound::Subscriber(stream) => self.broadcaster.add_subscriber(stream),
        }
    }

    fn handle_command(&mut self, request: &[u8], reply: &Sender<Triple>) {
        let mut context = RunContext {
            source: &mut self.source,
            broadcast: &mut self.broadcaster,
            session: &self.session,
            link: &mut self.link,
            status: self.status.as_ref(),
            last_summary: None,
        };
        self.dispatcher.dispatch(
            request,
            |triple| {
                if reply.send(triple).is_err() {
                    log::debug!("Control connection closed before its reply was ready");
                }
            },
            &mut context,
        );
    }

    fn handle_arm(&mut self, datagram: &[u8], from: SocketAddr) {
        let request = match ArmRequest::parse(datagram) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("Ignoring datagram from {from}: {e}");
                return;
            }
        };
        let ack = self.session.handle_arm_request(from, request.enable);
        if let Err(e) = self.link.sender().send_datagram(&ack, from) {
            log::warn!("Failed to acknowledge arm request from {from}: {e}");
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &ArmingSession {
        &self.session
    }
}

/// Local addresses the server actually bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub control: SocketAddr,
    pub publish: SocketAddr,
    pub arm: SocketAddr,
    pub register_echo: Option<SocketAddr>,
}

/// Server is a bound Service with its socket threads running
pub struct Server {
    service: Service<Simulator, UdpSocket>,
    inbound: Receiver<Inbound>,
    endpoints: Endpoints,
}

impl Server {
    /// Bind every endpoint in the config and start the socket threads
    pub fn bind(config: &Config, status: Option<Sender<RunStatus>>) -> Result<Self, ServiceError> {
        config.validate()?;
        let simulator = Simulator::new(&config.simulator)?;

        let control = bind_tcp(&config.control_address)?;
        let publish = bind_tcp(&config.publish_address)?;
        let arm = bind_udp(&config.arm_address)?;
        let echo = match &config.register_echo_address {
            Some(address) => Some(bind_udp(address)?),
            None => None,
        };

        let endpoints = Endpoints {
            control: control.local_addr()?,
            publish: publish.local_addr()?,
            arm: arm.local_addr()?,
            register_echo: match &echo {
                Some(socket) => Some(socket.local_addr()?),
                None => None,
            },
        };

        let (tx, rx) = mpsc::channel::<Inbound>();

        let control_tx = tx.clone();
        std::thread::Builder::new()
            .name("control".into())
            .spawn(move || accept_control(control, control_tx))?;

        let publish_tx = tx.clone();
        std::thread::Builder::new()
            .name("publish".into())
            .spawn(move || accept_subscribers(publish, publish_tx))?;

        let arm_reader = arm.try_clone()?;
        std::thread::Builder::new()
            .name("arm".into())
            .spawn(move || read_arm_requests(arm_reader, tx))?;

        if let Some(socket) = echo {
            std::thread::Builder::new()
                .name("register-echo".into())
                .spawn(move || echo_datagrams(socket))?;
        }

        log::info!(
            "Listening: control {}, publish {}, arm {}",
            endpoints.control,
            endpoints.publish,
            endpoints.arm
        );
        if let Some(address) = endpoints.register_echo {
            log::info!("Register echo on {address}");
        }

        Ok(Self {
            service: Service::new(simulator, arm, config.data_port, status),
            inbound: rx,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Service inbound messages until every socket thread has stopped
    pub fn run(mut self) -> Result<(), ServiceError> {
        for message in self.inbound.iter() {
            self.service.handle(message);
        }
        log::info!(
            "Service stopped after {} runs",
            self.service.dispatcher().run_counter()
        );
        Ok(())
    }
}

/// Bind the endpoints in the config and serve forever
pub fn serve(config: &Config, status: Option<Sender<RunStatus>>) -> Result<(), ServiceError> {
    Server::bind(config, status)?.run()
}

fn bind_tcp(address: &str) -> Result<TcpListener, ServiceError> {
    TcpListener::bind(address).map_err(|e| ServiceError::BindError(address.to_string(), e))
}

fn bind_udp(address: &str) -> Result<UdpSocket, ServiceError> {
    UdpSocket::bind(address).map_err(|e| ServiceError::BindError(address.to_string(), e))
}

fn accept_control(listener: TcpListener, tx: Sender<Inbound>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Failed to accept control connection: {e}");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        log::info!("Control connection from {peer:?}");
        let connection_tx = tx.clone();
        let spawned = std::thread::Builder::new()
            .name("control-connection".into())
            .spawn(move || {
                if let Err(e) = serve_control_connection(stream, connection_tx) {
                    log::info!("Control connection {peer:?} closed: {e}");
                }
            });
        if let Err(e) = spawned {
            log::warn!("Failed to spawn control connection thread: {e}");
        }
    }
}

/// One request in flight per connection: read a frame, wait for the reply, write it back
fn serve_control_connection(mut stream: TcpStream, tx: Sender<Inbound>) -> std::io::Result<()> {
    loop {
        let request = match read_frame(&mut stream) {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        let expected = reply_count(request.len());
        let (reply_tx, reply_rx) = mpsc::channel();
        if tx
            .send(Inbound::Command {
                request,
                reply: reply_tx,
            })
            .is_err()
        {
            return Ok(());
        }
        // All replies of a request travel back in one frame
        let replies: Vec<Triple> = reply_rx.iter().take(expected).collect();
        if replies.len() < expected {
            return Ok(());
        }
        write_frame(&mut stream, &encode_triples(&replies))?;
    }
}

fn accept_subscribers(listener: TcpListener, tx: Sender<Inbound>) {
    for stream in listener.incoming() {
        match stream {
            Ok(s) => {
                if tx.send(Inbound::Subscriber(s)).is_err() {
                    return;
                }
            }
            Err(e) => log::warn!("Failed to accept subscriber: {e}"),
        }
    }
}

fn read_arm_requests(socket: UdpSocket, tx: Sender<Inbound>) {
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        match socket.recv_from(&mut buffer) {
            Ok((n, from)) => {
                let message = Inbound::Arm {
                    datagram: buffer[..n].to_vec(),
                    from,
                };
                if tx.send(message).is_err() {
                    return;
                }
            }
            // Sends from this socket can surface ICMP errors here
            Err(e) => log::debug!("Arm endpoint receive error: {e}"),
        }
    }
}

fn echo_datagrams(socket: UdpSocket) {
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        match socket.recv_from(&mut buffer) {
            Ok((n, from)) => {
                log::debug!("Register echo: {n} bytes from {from}");
                if let Err(e) = socket.send_to(&buffer[..n], from) {
                    log::debug!("Register echo to {from} failed: {e}");
                }
            }
            Err(e) => log::debug!("Register echo receive error: {e}"),
        }
    }
}
