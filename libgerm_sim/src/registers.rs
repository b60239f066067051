use fxhash::FxHashMap;

// Named addresses of the emulated register bank. Only START and FRAME_NUMBER carry behavior,
// the rest are plain storage kept for parity with the hardware map.
pub const START: u32 = 0;
pub const FIFO_DATA: u32 = 24;
pub const FIFO_READ_COUNT: u32 = 25;
pub const FIFO_CONTROL: u32 = 26;
pub const FRAME_ACTIVE: u32 = 52;
pub const FRAME_LENGTH: u32 = 53;
/// Pseudo-register exposing the run counter
pub const FRAME_NUMBER: u32 = 54;

/// Value written to START that triggers a run
pub const START_VALUE: i32 = 1;

/// Name of a mapped register, for display
pub fn register_name(address: u32) -> Option<&'static str> {
    match address {
        START => Some("START"),
        FIFO_DATA => Some("FIFO_DATA"),
        FIFO_READ_COUNT => Some("FIFO_READ_COUNT"),
        FIFO_CONTROL => Some("FIFO_CONTROL"),
        FRAME_ACTIVE => Some("FRAME_ACTIVE"),
        FRAME_LENGTH => Some("FRAME_LENGTH"),
        FRAME_NUMBER => Some("FRAME_NUMBER"),
        _ => None,
    }
}

/// RegisterStore emulates the control/status register bank of the front-end.
///
/// Every address reads as 0 until it is written. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct RegisterStore {
    map: FxHashMap<u32, i32>,
}

impl RegisterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value at address, 0 if never written
    pub fn read(&self, address: u32) -> i32 {
        self.map.get(&address).copied().unwrap_or_default()
    }

    /// Store value at address, returning the stored value
    pub fn write(&mut self, address: u32, value: i32) -> i32 {
        self.map.insert(address, value);
        value
    }
}
