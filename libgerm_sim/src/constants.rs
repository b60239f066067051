// Wire constants of the emulated front-end. All multi-byte fields are big-endian unless noted.

/// Size of a single payload word in bytes
pub const WORD_SIZE: usize = 4;
/// Number of 32-bit words making up one encoded event
pub const WORDS_PER_EVENT: usize = 2;

/// Total capacity of one data datagram
pub const FRAME_CAPACITY_BYTES: usize = 4096;
/// Payload words carried by the first frame of a run (12 byte header)
pub const FIRST_FRAME_WORDS: usize = 1020;
/// Payload words carried by a continuation frame (4 byte header)
pub const CONTINUATION_FRAME_WORDS: usize = 1022;
pub const FIRST_HEADER_SIZE: usize = 12;
pub const SEQUENCE_HEADER_SIZE: usize = 4;
pub const FOOTER_SIZE: usize = 8;

pub const START_MAGIC: u32 = 0xFEED_FACE;
pub const END_MAGIC: u32 = 0xDECA_FBAD;

/// Signature expected in every arm/disarm request
pub const ARM_MAGIC: u32 = 0xDEAD_BEEF;
/// "Okay" in ASCII, returned to every valid arm/disarm request
pub const ARM_ACK_MAGIC: u32 = 0x4F6B_6179;
pub const ARM_REQUEST_SIZE: usize = 12;
pub const ARM_ACK_SIZE: usize = 8;

/// Value placed in every field of the reply to an unknown command
pub const UNKNOWN_COMMAND_MARKER: i32 = 0xDEAD;
/// Size of one (kind, address, value) command triple
pub const COMMAND_SIZE: usize = 12;
/// Upper bound on a control frame; anything larger closes the connection
pub const MAX_CONTROL_FRAME_SIZE: usize = 1024;

pub const DEFAULT_CONTROL_PORT: u16 = 5555;
pub const DEFAULT_PUBLISH_PORT: u16 = 5556;
pub const DEFAULT_ARM_PORT: u16 = 0x7D00;
pub const DEFAULT_REGISTER_ECHO_PORT: u16 = 0x7D01;
pub const DEFAULT_DATA_PORT: u16 = 0x7D03;

pub const DATA_TOPIC: &[u8] = b"data";
pub const META_TOPIC: &[u8] = b"meta";

/// Length of one clock tick of the coarse timestamp counter, in seconds
pub const TICK_SECONDS: f64 = 40.0 * 10e-9;
/// Coarse timestamps wrap at 2^31
pub const COARSE_TIMESTAMP_MODULUS: u64 = 1 << 31;
/// Largest value the 12 bit amplitude field can hold
pub const MAX_AMPLITUDE: u32 = (1 << 12) - 1;
/// Fine timestamps are 10 bits wide
pub const FINE_TIMESTAMP_RANGE: u32 = 1 << 10;
