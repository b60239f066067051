use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};

use byteorder::{ByteOrder, LittleEndian};

use super::arming::{arm_acknowledgment, ArmRequest};
use super::broadcast::{read_message, Topic};
use super::command::{decode_triples, encode_triples, read_frame, write_frame, Command, Triple};
use super::constants::ARM_ACK_SIZE;
use super::encoder::{decode, from_network_bytes, Event};
use super::error::ClientError;
use super::registers::{START, START_VALUE};

/// ControlClient talks to a running emulator over its control channel.
///
/// Requests are sent one at a time; each call blocks until the reply arrives.
#[derive(Debug)]
pub struct ControlClient {
    stream: TcpStream,
}

impl ControlClient {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Send a raw triple and return the raw reply
    pub fn request(&mut self, triple: Triple) -> Result<Triple, ClientError> {
        let reply = read_frame_after(&mut self.stream, &triple.to_bytes())?;
        Triple::from_bytes(&reply).map_err(|_| ClientError::BadReplySize(reply.len()))
    }

    /// Send several triples in one request. Replies come back in the same order
    pub fn request_batch(&mut self, triples: &[Triple]) -> Result<Vec<Triple>, ClientError> {
        let reply = read_frame_after(&mut self.stream, &encode_triples(triples))?;
        match decode_triples(&reply) {
            Ok(replies) if replies.len() == triples.len() => Ok(replies),
            _ => Err(ClientError::BadReplySize(reply.len())),
        }
    }

    fn send(&mut self, command: Command) -> Result<Triple, ClientError> {
        let reply = self.request(command.to_triple())?;
        if reply.is_unknown() {
            return Err(ClientError::Rejected);
        }
        Ok(reply)
    }

    pub fn read(&mut self, address: u32) -> Result<i32, ClientError> {
        Ok(self.send(Command::RegisterRead { address })?.value)
    }

    pub fn write(&mut self, address: u32, value: i32) -> Result<(), ClientError> {
        self.send(Command::RegisterWrite { address, value })?;
        Ok(())
    }

    /// Trigger a run. Returns as soon as the emulator acknowledges; the run itself continues
    pub fn start(&mut self) -> Result<(), ClientError> {
        self.write(START, START_VALUE)
    }
}

fn read_frame_after(stream: &mut TcpStream, body: &[u8]) -> std::io::Result<Vec<u8>> {
    write_frame(stream, body)?;
    read_frame(stream)
}

/// Arm (or disarm) the emulator at `server` from `socket` and wait for the acknowledgment.
///
/// Data frames will go to the IP of `socket`. Use a read timeout on the socket to bound the wait.
pub fn request_arm(socket: &UdpSocket, server: SocketAddr, enable: bool) -> Result<(), ClientError> {
    let request = ArmRequest { unused: 0, enable };
    socket.send_to(&request.to_bytes(), server)?;
    let mut buffer = [0u8; 64];
    let (n, _) = socket.recv_from(&mut buffer)?;
    if n != ARM_ACK_SIZE || buffer[..n] != arm_acknowledgment() {
        return Err(ClientError::BadAcknowledgment(n));
    }
    Ok(())
}

/// One message taken off the broadcast channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    /// Events of one generated message. Words that do not decode are skipped
    Data(Vec<Event>),
    /// The run with this number completed
    Meta { run_number: u32 },
}

/// Subscription follows the broadcast channel of a running emulator
#[derive(Debug)]
pub struct Subscription {
    stream: TcpStream,
}

impl Subscription {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, ClientError> {
        Ok(Self {
            stream: TcpStream::connect(address)?,
        })
    }

    /// Block until the next message arrives
    pub fn next_message(&mut self) -> Result<Published, ClientError> {
        let parts = read_message(&mut self.stream)?;
        let [topic, payload] = parts.as_slice() else {
            return Err(ClientError::BadMessage(format!("{}-part", parts.len())));
        };
        match Topic::from_bytes(topic) {
            Some(Topic::Data) => Ok(Published::Data(
                from_network_bytes(payload)
                    .iter()
                    .filter_map(decode)
                    .collect(),
            )),
            Some(Topic::Meta) if payload.len() >= 4 => Ok(Published::Meta {
                run_number: LittleEndian::read_u32(&payload[..4]),
            }),
            _ => Err(ClientError::BadMessage(
                String::from_utf8_lossy(topic).into_owned(),
            )),
        }
    }
}
