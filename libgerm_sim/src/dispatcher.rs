use super::command::{Command, CommandKind, Triple};
use super::constants::COMMAND_SIZE;
use super::error::CommandError;
use super::registers::{RegisterStore, FRAME_NUMBER, START, START_VALUE};

/// The action behind the start register.
///
/// The dispatcher calls `run` and then `complete` with the freshly incremented run counter.
pub trait RunTrigger {
    /// Execute one full run to completion
    fn run(&mut self, run_number: u32);
    /// Announce out of band that the run finished
    fn complete(&mut self, run_number: u32);
}

/// CommandDispatcher applies control commands to the register bank.
///
/// It is the only writer of its RegisterStore and of the run counter. Commands are handled one at
/// a time and a triggered run finishes before `dispatch` returns.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    registers: RegisterStore,
    run_counter: u32,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a register. FRAME_NUMBER always reflects the run counter
    pub fn read(&self, address: u32) -> i32 {
        if address == FRAME_NUMBER {
            self.run_counter as i32
        } else {
            self.registers.read(address)
        }
    }

    pub fn write(&mut self, address: u32, value: i32) -> i32 {
        self.registers.write(address, value)
    }

    pub fn run_counter(&self) -> u32 {
        self.run_counter
    }

    /// Handle one raw request from the control channel.
    ///
    /// A request carries one or more 12-byte triples, handled in order. `respond` is called once
    /// per triple, before any run that triple triggers starts, so the requester is acknowledged
    /// while data is produced. Malformed or unsupported commands are answered with the unknown
    /// sentinel; a body that is not a whole number of triples gets a single sentinel. Returns the
    /// numbers of the runs triggered.
    pub fn dispatch<F, T>(&mut self, request: &[u8], mut respond: F, trigger: &mut T) -> Vec<u32>
    where
        F: FnMut(Triple),
        T: RunTrigger + ?Sized,
    {
        if request.is_empty() || request.len() % COMMAND_SIZE != 0 {
            log::warn!(
                "Rejecting control request: {}",
                CommandError::BadSize(request.len())
            );
            respond(Triple::unknown());
            return Vec::new();
        }
        let mut runs = Vec::new();
        for chunk in request.chunks_exact(COMMAND_SIZE) {
            if let Some(run_number) = self.dispatch_one(chunk, &mut respond, trigger) {
                runs.push(run_number);
            }
        }
        runs
    }

    fn dispatch_one<F, T>(&mut self, chunk: &[u8], respond: &mut F, trigger: &mut T) -> Option<u32>
    where
        F: FnMut(Triple),
        T: RunTrigger + ?Sized,
    {
        let triple = match Triple::from_bytes(chunk) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Rejecting control request: {e}");
                respond(Triple::unknown());
                return None;
            }
        };

        let command = match Command::try_from(triple) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Rejecting control command {triple:?}: {e}");
                respond(Triple::unknown());
                return None;
            }
        };

        match command {
            Command::RegisterWrite { address, value } => {
                self.write(address, value);
                respond(triple);
                if address == START && value == START_VALUE {
                    self.run_counter += 1;
                    let run_number = self.run_counter;
                    trigger.run(run_number);
                    trigger.complete(run_number);
                    return Some(run_number);
                }
                None
            }
            Command::RegisterRead { address } => {
                respond(Triple::new(
                    CommandKind::RegisterRead as i32,
                    address as i32,
                    self.read(address),
                ));
                None
            }
            Command::StartDma => {
                log::warn!(
                    "Rejecting control command {triple:?}: {}",
                    CommandError::Unsupported(triple.kind)
                );
                respond(Triple::unknown());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingTrigger {
        events: Vec<(&'static str, u32)>,
    }

    impl RunTrigger for RecordingTrigger {
        fn run(&mut self, run_number: u32) {
            self.events.push(("run", run_number));
        }
        fn complete(&mut self, run_number: u32) {
            self.events.push(("complete", run_number));
        }
    }

    fn send_all(
        dispatcher: &mut CommandDispatcher,
        trigger: &mut RecordingTrigger,
        request: &[u8],
    ) -> (Vec<Triple>, Vec<u32>) {
        let mut replies = Vec::new();
        let runs = dispatcher.dispatch(request, |r| replies.push(r), trigger);
        (replies, runs)
    }

    fn send(
        dispatcher: &mut CommandDispatcher,
        trigger: &mut RecordingTrigger,
        request: &[u8],
    ) -> (Triple, Option<u32>) {
        let (replies, runs) = send_all(dispatcher, trigger, request);
        assert_eq!(replies.len(), 1);
        (replies[0], runs.first().copied())
    }

    #[test]
    fn test_write_then_read() {
        let mut dispatcher = CommandDispatcher::new();
        let mut trigger = RecordingTrigger::default();

        let write = Triple::new(1, 1, 42);
        let (reply, run) = send(&mut dispatcher, &mut trigger, &write.to_bytes());
        assert_eq!(reply, write);
        assert_eq!(run, None);

        let (reply, _) = send(&mut dispatcher, &mut trigger, &Triple::new(0, 1, 0).to_bytes());
        assert_eq!(reply, Triple::new(0, 1, 42));

        let (reply, _) = send(&mut dispatcher, &mut trigger, &Triple::new(0, 99, 5).to_bytes());
        assert_eq!(reply, Triple::new(0, 99, 0));
        assert!(trigger.events.is_empty());
    }

    #[test]
    fn test_start_triggers_one_run() {
        let mut dispatcher = CommandDispatcher::new();
        let mut trigger = RecordingTrigger::default();
        let start = Triple::new(1, 0, 1);

        let (reply, run) = send(&mut dispatcher, &mut trigger, &start.to_bytes());
        assert_eq!(reply, start);
        assert_eq!(run, Some(1));
        assert_eq!(trigger.events, vec![("run", 1), ("complete", 1)]);

        send(&mut dispatcher, &mut trigger, &start.to_bytes());
        assert_eq!(dispatcher.run_counter(), 2);
        assert_eq!(dispatcher.read(FRAME_NUMBER), 2);
        assert_eq!(trigger.events.len(), 4);
        assert_eq!(trigger.events[3], ("complete", 2));
    }

    #[test]
    fn test_other_writes_do_not_trigger() {
        let mut dispatcher = CommandDispatcher::new();
        let mut trigger = RecordingTrigger::default();
        for (address, value) in [(0, 0), (0, 2), (1, 1), (FRAME_NUMBER as i32, 1)] {
            let (_, run) = send(
                &mut dispatcher,
                &mut trigger,
                &Triple::new(1, address, value).to_bytes(),
            );
            assert_eq!(run, None);
        }
        assert_eq!(dispatcher.run_counter(), 0);
        assert_eq!(dispatcher.read(FRAME_NUMBER), 0);
        assert!(trigger.events.is_empty());
    }

    #[test]
    fn test_malformed_commands_soft_fail() {
        let mut dispatcher = CommandDispatcher::new();
        let mut trigger = RecordingTrigger::default();

        let (reply, _) = send(&mut dispatcher, &mut trigger, &[1, 2, 3]);
        assert!(reply.is_unknown());
        let (reply, _) = send(&mut dispatcher, &mut trigger, &Triple::new(2, 0, 0).to_bytes());
        assert!(reply.is_unknown());
        let (reply, _) = send(&mut dispatcher, &mut trigger, &Triple::new(7, 1, 1).to_bytes());
        assert!(reply.is_unknown());
        let (reply, _) = send(&mut dispatcher, &mut trigger, &Triple::new(1, -1, 1).to_bytes());
        assert!(reply.is_unknown());

        // The dispatcher keeps serving well formed commands afterwards
        let (reply, _) = send(&mut dispatcher, &mut trigger, &Triple::new(1, 3, 9).to_bytes());
        assert_eq!(reply, Triple::new(1, 3, 9));
        assert_eq!(dispatcher.read(3), 9);
    }

    #[test]
    fn test_multiple_triples_in_order() {
        let mut dispatcher = CommandDispatcher::new();
        let mut trigger = RecordingTrigger::default();

        let mut request = Vec::new();
        request.extend_from_slice(&Triple::new(1, 5, 11).to_bytes());
        request.extend_from_slice(&Triple::new(0, 5, 0).to_bytes());
        let (replies, runs) = send_all(&mut dispatcher, &mut trigger, &request);
        assert_eq!(replies, vec![Triple::new(1, 5, 11), Triple::new(0, 5, 11)]);
        assert!(runs.is_empty());

        // A start between two reads runs before the second read is answered
        let mut request = Vec::new();
        request.extend_from_slice(&Triple::new(1, 0, 1).to_bytes());
        request.extend_from_slice(&Triple::new(9, 0, 0).to_bytes());
        request.extend_from_slice(&Triple::new(0, FRAME_NUMBER as i32, 0).to_bytes());
        let (replies, runs) = send_all(&mut dispatcher, &mut trigger, &request);
        assert_eq!(runs, vec![1]);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], Triple::new(1, 0, 1));
        assert!(replies[1].is_unknown());
        assert_eq!(replies[2], Triple::new(0, FRAME_NUMBER as i32, 1));
        assert_eq!(trigger.events, vec![("run", 1), ("complete", 1)]);
    }

    #[test]
    fn test_partial_triple_gets_one_sentinel() {
        let mut dispatcher = CommandDispatcher::new();
        let mut trigger = RecordingTrigger::default();

        let mut request = Triple::new(1, 0, 1).to_bytes().to_vec();
        request.extend_from_slice(&[0, 0, 0, 0]);
        let (replies, runs) = send_all(&mut dispatcher, &mut trigger, &request);
        assert_eq!(replies, vec![Triple::unknown()]);
        assert!(runs.is_empty());

        let (replies, _) = send_all(&mut dispatcher, &mut trigger, &[]);
        assert_eq!(replies, vec![Triple::unknown()]);
        assert_eq!(dispatcher.run_counter(), 0);
    }
}
