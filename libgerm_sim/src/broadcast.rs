//! The publish side channel.
//!
//! Subscribers connect over TCP and receive every message published after they connected. A
//! message is a list of parts:
//!
//! ```text
//! [u32 BE part count] ([u32 BE part length] [part bytes])*
//! ```
//!
//! The service publishes two kinds of messages, both with two parts:
//!
//! - `data`: the network order bytes of one sub-batch of events
//! - `meta`: the run counter and a 0, as two little-endian u32, once a run completes
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::constants::{DATA_TOPIC, META_TOPIC};

/// Subscribers that cannot take a message within this time are dropped
const SUBSCRIBER_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
/// Refuse to read parts larger than this on the subscriber side
const MAX_PART_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Data,
    Meta,
}

impl Topic {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Data => DATA_TOPIC,
            Self::Meta => META_TOPIC,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            DATA_TOPIC => Some(Self::Data),
            META_TOPIC => Some(Self::Meta),
            _ => None,
        }
    }
}

/// Fire-and-forget fan-out of complete messages
pub trait Broadcast {
    fn publish(&mut self, topic: Topic, payload: &[u8]);
}

/// Payload of the meta message announcing a completed run
pub fn meta_payload(run_number: u32) -> [u8; 8] {
    let mut payload = [0u8; 8];
    LittleEndian::write_u32_into(&[run_number, 0], &mut payload);
    payload
}

/// Frame a message as it travels to subscribers
pub fn encode_message(parts: &[&[u8]]) -> Vec<u8> {
    let total = 4 + parts.iter().map(|p| 4 + p.len()).sum::<usize>();
    let mut message = Vec::with_capacity(total);
    let mut word = [0u8; 4];
    BigEndian::write_u32(&mut word, parts.len() as u32);
    message.extend_from_slice(&word);
    for part in parts {
        BigEndian::write_u32(&mut word, part.len() as u32);
        message.extend_from_slice(&word);
        message.extend_from_slice(part);
    }
    message
}

/// Read one message from a subscription stream
pub fn read_message<R: Read>(reader: &mut R) -> std::io::Result<Vec<Vec<u8>>> {
    let n_parts = reader.read_u32::<BigEndian>()?;
    let mut parts = Vec::with_capacity(n_parts as usize);
    for _ in 0..n_parts {
        let len = reader.read_u32::<BigEndian>()? as usize;
        if len > MAX_PART_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Message part of {len} bytes is too large"),
            ));
        }
        let mut part = vec![0u8; len];
        reader.read_exact(&mut part)?;
        parts.push(part);
    }
    Ok(parts)
}

/// Broadcaster owns the connected subscribers and writes every message to each of them.
#[derive(Debug, Default)]
pub struct Broadcaster {
    subscribers: Vec<TcpStream>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&mut self, stream: TcpStream) {
        if let Err(e) = stream.set_write_timeout(Some(SUBSCRIBER_WRITE_TIMEOUT)) {
            log::warn!("Failed to set subscriber write timeout: {e}");
        }
        let peer = stream.peer_addr().ok();
        self.subscribers.push(stream);
        log::info!(
            "Subscriber connected: {peer:?} ({} total)",
            self.subscriber_count()
        );
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Broadcast for Broadcaster {
    fn publish(&mut self, topic: Topic, payload: &[u8]) {
        if self.subscribers.is_empty() {
            return;
        }
        let message = encode_message(&[topic.as_bytes(), payload]);
        self.subscribers
            .retain_mut(|subscriber| match subscriber.write_all(&message) {
                Ok(()) => true,
                Err(e) => {
                    log::info!("Dropping subscriber {:?}: {e}", subscriber.peer_addr().ok());
                    false
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;

    #[test]
    fn test_meta_payload() {
        assert_eq!(meta_payload(3), [3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_message_framing() {
        let message = encode_message(&[b"data", &[1, 2, 3]]);
        assert_eq!(
            message,
            vec![0, 0, 0, 2, 0, 0, 0, 4, b'd', b'a', b't', b'a', 0, 0, 0, 3, 1, 2, 3]
        );
        let parts = read_message(&mut Cursor::new(message)).unwrap();
        assert_eq!(parts, vec![b"data".to_vec(), vec![1, 2, 3]]);
        assert_eq!(Topic::from_bytes(&parts[0]), Some(Topic::Data));
    }

    #[test]
    fn test_truncated_message() {
        let message = encode_message(&[b"meta", &meta_payload(1)]);
        assert!(read_message(&mut Cursor::new(&message[..message.len() - 1])).is_err());
    }

    #[test]
    fn test_publish_to_subscriber() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let mut broadcaster = Broadcaster::new();
        broadcaster.add_subscriber(server_side);
        broadcaster.publish(Topic::Meta, &meta_payload(9));

        let parts = read_message(&mut client).unwrap();
        assert_eq!(Topic::from_bytes(&parts[0]), Some(Topic::Meta));
        assert_eq!(parts[1], meta_payload(9).to_vec());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }
}
