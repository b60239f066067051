// Event word layout:
//   word 0: "0" [4 bit chip] [5 bit channel] [10 bit fine timestamp] [12 bit amplitude]
//   word 1: "1000" [28 bit coarse timestamp]
use byteorder::{BigEndian, ByteOrder};

use super::constants::{WORDS_PER_EVENT, WORD_SIZE};

const CHIP_SHIFT: u32 = 27;
const CHANNEL_SHIFT: u32 = 22;
const FINE_TS_SHIFT: u32 = 12;
const CHIP_MASK: u32 = 0xF;
const CHANNEL_MASK: u32 = 0x1F;
const FINE_TS_MASK: u32 = 0x3FF;
const AMPLITUDE_MASK: u32 = 0xFFF;
const TIMESTAMP_FLAG: u32 = 0b1000 << 28;
const COARSE_TS_MASK: u32 = 0x0FFF_FFFF;

/// The fields of one detector hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Event {
    pub chip: u32,
    pub channel: u32,
    pub fine_timestamp: u32,
    pub amplitude: u32,
    pub coarse_timestamp: u32,
}

/// The two 32-bit words an event is packed into, in host order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventWords(pub [u32; WORDS_PER_EVENT]);

/// Pack an event. Fields wider than their slot are truncated to it
pub fn encode(event: &Event) -> EventWords {
    let data = ((event.chip & CHIP_MASK) << CHIP_SHIFT)
        | ((event.channel & CHANNEL_MASK) << CHANNEL_SHIFT)
        | ((event.fine_timestamp & FINE_TS_MASK) << FINE_TS_SHIFT)
        | (event.amplitude & AMPLITUDE_MASK);
    let timestamp = TIMESTAMP_FLAG | (event.coarse_timestamp & COARSE_TS_MASK);
    EventWords([data, timestamp])
}

/// Unpack an event. Returns None if the words do not carry the expected flags
pub fn decode(words: &EventWords) -> Option<Event> {
    let [data, timestamp] = words.0;
    if data >> 31 != 0 || timestamp & !COARSE_TS_MASK != TIMESTAMP_FLAG {
        return None;
    }
    Some(Event {
        chip: (data >> CHIP_SHIFT) & CHIP_MASK,
        channel: (data >> CHANNEL_SHIFT) & CHANNEL_MASK,
        fine_timestamp: (data >> FINE_TS_SHIFT) & FINE_TS_MASK,
        amplitude: data & AMPLITUDE_MASK,
        coarse_timestamp: timestamp & COARSE_TS_MASK,
    })
}

/// Serialize event words in network byte order
pub fn to_network_bytes(events: &[EventWords]) -> Vec<u8> {
    let mut bytes = vec![0u8; events.len() * WORDS_PER_EVENT * WORD_SIZE];
    for (event, chunk) in events
        .iter()
        .zip(bytes.chunks_exact_mut(WORDS_PER_EVENT * WORD_SIZE))
    {
        BigEndian::write_u32_into(&event.0, chunk);
    }
    bytes
}

/// Read event words back from network byte order. A trailing partial event is ignored
pub fn from_network_bytes(bytes: &[u8]) -> Vec<EventWords> {
    bytes
        .chunks_exact(WORDS_PER_EVENT * WORD_SIZE)
        .map(|chunk| {
            let mut words = [0u32; WORDS_PER_EVENT];
            BigEndian::read_u32_into(chunk, &mut words);
            EventWords(words)
        })
        .collect()
}
