use std::net::{SocketAddr, UdpSocket};

use super::arming::ArmingSession;
use super::constants::WORD_SIZE;
use super::framer::Frame;

/// Something that can put a datagram on the wire
pub trait DatagramSender {
    fn send_datagram(&self, buffer: &[u8], destination: SocketAddr) -> std::io::Result<usize>;
}

impl DatagramSender for UdpSocket {
    fn send_datagram(&self, buffer: &[u8], destination: SocketAddr) -> std::io::Result<usize> {
        self.send_to(buffer, destination)
    }
}

/// Transmission counters, reset at the start of every run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub frames_suppressed: u64,
    pub send_errors: u64,
    pub bytes_sent: u64,
}

/// DataLink sends frames to whoever the arming session currently points at.
///
/// Sends are fire-and-forget: failures are counted and logged, never retried.
#[derive(Debug)]
pub struct DataLink<S> {
    sender: S,
    stats: LinkStats,
}

impl<S: DatagramSender> DataLink<S> {
    pub fn new(sender: S) -> Self {
        Self {
            sender,
            stats: LinkStats::default(),
        }
    }

    /// Send a frame if the session is armed. Returns true if the frame left
    pub fn transmit(&mut self, session: &ArmingSession, frame: &Frame) -> bool {
        let Some(destination) = session.current_destination() else {
            self.stats.frames_suppressed += 1;
            return false;
        };
        match self.sender.send_datagram(&frame.bytes, destination) {
            Ok(n) => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += n as u64;
                if let Some(run_id) = frame.run_id() {
                    log::debug!(
                        "Run {run_id}: first frame ({} words) sent to {destination}",
                        frame.payload().len() / WORD_SIZE
                    );
                }
                true
            }
            Err(e) => {
                self.stats.send_errors += 1;
                log::debug!(
                    "Failed to send frame {} to {destination}: {e}",
                    frame.sequence
                );
                false
            }
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Return the counters and start over
    pub fn take_stats(&mut self) -> LinkStats {
        std::mem::take(&mut self.stats)
    }
}
