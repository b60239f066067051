use byteorder::{BigEndian, ByteOrder};
use std::net::{IpAddr, SocketAddr};

use super::constants::{ARM_ACK_MAGIC, ARM_ACK_SIZE, ARM_MAGIC, ARM_REQUEST_SIZE};
use super::error::ArmRequestError;

/// A parsed arm/disarm request: three big-endian u32 (magic, unused, enable)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmRequest {
    pub unused: u32,
    pub enable: bool,
}

impl ArmRequest {
    pub fn parse(buffer: &[u8]) -> Result<Self, ArmRequestError> {
        if buffer.len() != ARM_REQUEST_SIZE {
            return Err(ArmRequestError::BadSize(buffer.len()));
        }
        let magic = BigEndian::read_u32(&buffer[0..4]);
        if magic != ARM_MAGIC {
            return Err(ArmRequestError::BadMagic(magic));
        }
        Ok(Self {
            unused: BigEndian::read_u32(&buffer[4..8]),
            enable: BigEndian::read_u32(&buffer[8..12]) != 0,
        })
    }

    pub fn to_bytes(&self) -> [u8; ARM_REQUEST_SIZE] {
        let mut buffer = [0u8; ARM_REQUEST_SIZE];
        BigEndian::write_u32_into(&[ARM_MAGIC, self.unused, self.enable as u32], &mut buffer);
        buffer
    }
}

/// The fixed acknowledgment: four pad bytes then the ack magic
pub fn arm_acknowledgment() -> [u8; ARM_ACK_SIZE] {
    let mut buffer = [0u8; ARM_ACK_SIZE];
    BigEndian::write_u32(&mut buffer[4..8], ARM_ACK_MAGIC);
    buffer
}

/// ArmingSession tracks the single receiver of data frames.
///
/// The destination only changes through `handle_arm_request`; a new arm request replaces the
/// previous receiver.
#[derive(Debug, Clone)]
pub struct ArmingSession {
    destination: Option<IpAddr>,
    data_port: u16,
}

impl ArmingSession {
    /// Create an unarmed session delivering to `data_port` once armed
    pub fn new(data_port: u16) -> Self {
        Self {
            destination: None,
            data_port,
        }
    }

    /// Arm to (or disarm from) the requester. The reply does not depend on the outcome
    pub fn handle_arm_request(&mut self, remote: SocketAddr, enable: bool) -> [u8; ARM_ACK_SIZE] {
        if enable {
            if let Some(previous) = self.destination.filter(|ip| *ip != remote.ip()) {
                log::info!("Arm request from {remote} replaces receiver {previous}");
            } else {
                log::info!("Armed by {remote}");
            }
            self.destination = Some(remote.ip());
        } else {
            log::info!("Disarmed by {remote}");
            self.destination = None;
        }
        arm_acknowledgment()
    }

    /// Where data frames go: the armed host on the data port
    pub fn current_destination(&self) -> Option<SocketAddr> {
        self.destination
            .map(|ip| SocketAddr::new(ip, self.data_port))
    }

    pub fn is_armed(&self) -> bool {
        self.destination.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_DATA_PORT;

    fn remote(last: u8, port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, last], port))
    }

    #[test]
    fn test_parse_request() {
        let buffer = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0, 0, 0, 0, 1];
        let request = ArmRequest::parse(&buffer).unwrap();
        assert!(request.enable);
        assert_eq!(request.to_bytes(), buffer);

        let buffer = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 5, 0, 0, 0, 0];
        assert!(!ArmRequest::parse(&buffer).unwrap().enable);
    }

    #[test]
    fn test_reject_malformed() {
        let buffer = [0xDE, 0xAD, 0xBE, 0xEE, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(
            ArmRequest::parse(&buffer),
            Err(ArmRequestError::BadMagic(0xDEAD_BEEE))
        );
        assert_eq!(
            ArmRequest::parse(&buffer[..11]),
            Err(ArmRequestError::BadSize(11))
        );
        assert_eq!(
            ArmRequest::parse(&[0u8; 16]),
            Err(ArmRequestError::BadSize(16))
        );
    }

    #[test]
    fn test_acknowledgment_bytes() {
        assert_eq!(arm_acknowledgment(), [0, 0, 0, 0, 0x4F, 0x6B, 0x61, 0x79]);
    }

    #[test]
    fn test_arm_disarm_transitions() {
        let mut session = ArmingSession::new(DEFAULT_DATA_PORT);
        assert_eq!(session.current_destination(), None);

        let ack = session.handle_arm_request(remote(10, 40000), true);
        assert_eq!(ack, arm_acknowledgment());
        assert_eq!(
            session.current_destination(),
            Some(remote(10, DEFAULT_DATA_PORT))
        );

        // Last writer wins
        session.handle_arm_request(remote(11, 40001), true);
        assert_eq!(
            session.current_destination(),
            Some(remote(11, DEFAULT_DATA_PORT))
        );

        let ack = session.handle_arm_request(remote(12, 40002), false);
        assert_eq!(ack, arm_acknowledgment());
        assert!(!session.is_armed());

        // Disarming twice is harmless
        session.handle_arm_request(remote(12, 40002), false);
        assert_eq!(session.current_destination(), None);
    }
}
