use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use super::constants::{COMMAND_SIZE, MAX_CONTROL_FRAME_SIZE, UNKNOWN_COMMAND_MARKER};
use super::error::CommandError;

/// Read one length-prefixed (u32 BE) frame from the control channel
pub fn read_frame<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let len = reader.read_u32::<BigEndian>()? as usize;
    if len > MAX_CONTROL_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Control frame of {len} bytes is too large"),
        ));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Write one length-prefixed (u32 BE) frame to the control channel
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> std::io::Result<()> {
    writer.write_u32::<BigEndian>(body.len() as u32)?;
    writer.write_all(body)?;
    writer.flush()
}

/// Number of reply triples a control request of `len` bytes is answered with
pub fn reply_count(len: usize) -> usize {
    if len > 0 && len % COMMAND_SIZE == 0 {
        len / COMMAND_SIZE
    } else {
        1
    }
}

/// Concatenate triples into one control frame body
pub fn encode_triples(triples: &[Triple]) -> Vec<u8> {
    triples.iter().flat_map(|t| t.to_bytes()).collect()
}

/// Split a control frame body into triples. The body must be a whole number of triples
pub fn decode_triples(body: &[u8]) -> Result<Vec<Triple>, CommandError> {
    if body.is_empty() || body.len() % COMMAND_SIZE != 0 {
        return Err(CommandError::BadSize(body.len()));
    }
    body.chunks_exact(COMMAND_SIZE).map(Triple::from_bytes).collect()
}

/// Numeric command kinds as they appear on the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CommandKind {
    RegisterRead = 0,
    RegisterWrite = 1,
    StartDma = 2,
}

impl TryFrom<i32> for CommandKind {
    type Error = CommandError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RegisterRead),
            1 => Ok(Self::RegisterWrite),
            2 => Ok(Self::StartDma),
            _ => Err(CommandError::UnknownKind(value)),
        }
    }
}

/// The raw (kind, address, value) triple exchanged on the control channel.
///
/// Fields are little-endian i32 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Triple {
    pub kind: i32,
    pub address: i32,
    pub value: i32,
}

impl Triple {
    pub fn new(kind: i32, address: i32, value: i32) -> Self {
        Self {
            kind,
            address,
            value,
        }
    }

    /// Reply sent for any command that cannot be honored
    pub fn unknown() -> Self {
        Self::new(
            UNKNOWN_COMMAND_MARKER,
            UNKNOWN_COMMAND_MARKER,
            UNKNOWN_COMMAND_MARKER,
        )
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommandError> {
        if bytes.len() != COMMAND_SIZE {
            return Err(CommandError::BadSize(bytes.len()));
        }
        let mut fields = [0i32; 3];
        LittleEndian::read_i32_into(bytes, &mut fields);
        Ok(Self::new(fields[0], fields[1], fields[2]))
    }

    pub fn to_bytes(&self) -> [u8; COMMAND_SIZE] {
        let mut bytes = [0u8; COMMAND_SIZE];
        LittleEndian::write_i32_into(&[self.kind, self.address, self.value], &mut bytes);
        bytes
    }
}

/// A decoded control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RegisterRead { address: u32 },
    RegisterWrite { address: u32, value: i32 },
    StartDma,
}

impl Command {
    /// Encode the command into its wire triple
    pub fn to_triple(&self) -> Triple {
        match *self {
            Self::RegisterRead { address } => {
                Triple::new(CommandKind::RegisterRead as i32, address as i32, 0)
            }
            Self::RegisterWrite { address, value } => {
                Triple::new(CommandKind::RegisterWrite as i32, address as i32, value)
            }
            Self::StartDma => Triple::new(CommandKind::StartDma as i32, 0, 0),
        }
    }
}

impl TryFrom<Triple> for Command {
    type Error = CommandError;
    fn try_from(triple: Triple) -> Result<Self, Self::Error> {
        let kind = CommandKind::try_from(triple.kind)?;
        if kind == CommandKind::StartDma {
            return Ok(Self::StartDma);
        }
        let address =
            u32::try_from(triple.address).map_err(|_| CommandError::NegativeAddress(triple.address))?;
        match kind {
            CommandKind::RegisterRead => Ok(Self::RegisterRead { address }),
            _ => Ok(Self::RegisterWrite {
                address,
                value: triple.value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_wire_format() {
        let triple = Triple::new(1, 0, 1);
        assert_eq!(
            triple.to_bytes(),
            [1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]
        );
        assert_eq!(Triple::from_bytes(&triple.to_bytes()), Ok(triple));
    }

    #[test]
    fn test_bad_size() {
        assert_eq!(
            Triple::from_bytes(&[0u8; 8]),
            Err(CommandError::BadSize(8))
        );
    }

    #[test]
    fn test_decode_commands() {
        assert_eq!(
            Command::try_from(Triple::new(0, 7, 123)),
            Ok(Command::RegisterRead { address: 7 })
        );
        assert_eq!(
            Command::try_from(Triple::new(1, 0, 1)),
            Ok(Command::RegisterWrite {
                address: 0,
                value: 1
            })
        );
        assert_eq!(Command::try_from(Triple::new(2, 0, 0)), Ok(Command::StartDma));
        assert_eq!(
            Command::try_from(Triple::new(9, 0, 0)),
            Err(CommandError::UnknownKind(9))
        );
        assert_eq!(
            Command::try_from(Triple::new(0, -4, 0)),
            Err(CommandError::NegativeAddress(-4))
        );
    }

    #[test]
    fn test_control_frames() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &Triple::new(0, 5, 0).to_bytes()).unwrap();
        assert_eq!(&wire[..4], &[0, 0, 0, 12]);
        let body = read_frame(&mut std::io::Cursor::new(wire)).unwrap();
        assert_eq!(Triple::from_bytes(&body), Ok(Triple::new(0, 5, 0)));

        let oversized = [0u8, 1, 0, 0];
        assert!(read_frame(&mut std::io::Cursor::new(oversized)).is_err());
    }

    #[test]
    fn test_multiple_triples() {
        let triples = [Triple::new(1, 2, 3), Triple::new(0, 2, 0)];
        let body = encode_triples(&triples);
        assert_eq!(body.len(), 24);
        assert_eq!(reply_count(body.len()), 2);
        assert_eq!(decode_triples(&body), Ok(triples.to_vec()));

        assert_eq!(reply_count(0), 1);
        assert_eq!(reply_count(13), 1);
        assert_eq!(decode_triples(&body[..20]), Err(CommandError::BadSize(20)));
    }

    #[test]
    fn test_unknown_sentinel() {
        let reply = Triple::unknown();
        assert!(reply.is_unknown());
        assert_eq!(&reply.to_bytes()[0..4], &[0xAD, 0xDE, 0, 0]);
    }
}
