#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Generating,
    Complete,
}

/// Progress of the run being generated, as reported to a UI
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStatus {
    pub progress: f32,
    pub run_number: u32,
    pub phase: RunPhase,
}

impl RunStatus {
    pub fn new(progress: f32, run_number: u32, phase: RunPhase) -> Self {
        Self {
            progress,
            run_number,
            phase,
        }
    }
}
