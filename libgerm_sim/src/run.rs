use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use super::arming::ArmingSession;
use super::broadcast::{meta_payload, Broadcast, Topic};
use super::dispatcher::RunTrigger;
use super::encoder::to_network_bytes;
use super::framer::PacketFramer;
use super::link::{DataLink, DatagramSender, LinkStats};
use super::run_status::{RunPhase, RunStatus};
use super::simulator::EventSource;

/// What one run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_number: u32,
    pub messages: usize,
    pub events: u64,
    pub payload_bytes: u64,
    /// Frames cut by the framer, whether or not they were transmitted
    pub frames: u32,
    pub link: LinkStats,
    pub elapsed: Duration,
}

fn report(status: Option<&Sender<RunStatus>>, run_status: RunStatus) {
    if let Some(tx) = status {
        if tx.send(run_status).is_err() {
            log::debug!("Run status receiver is gone");
        }
    }
}

/// Execute one run: generate every message of the source, publish it whole, and cut the stream
/// into frames sent through the link.
///
/// The framer runs identically whether or not the session is armed; only transmission depends on
/// it.
pub fn execute_run<E, B, S>(
    run_number: u32,
    source: &mut E,
    broadcast: &mut B,
    session: &ArmingSession,
    link: &mut DataLink<S>,
    status: Option<&Sender<RunStatus>>,
) -> RunSummary
where
    E: EventSource + ?Sized,
    B: Broadcast + ?Sized,
    S: DatagramSender,
{
    let start = Instant::now();
    link.take_stats();
    report(status, RunStatus::new(0.0, run_number, RunPhase::Generating));

    let plan = source.plan_run();
    let n_messages = plan.len();
    let mut framer = PacketFramer::new(run_number);
    let mut cursor = 0;
    let mut events: u64 = 0;
    let mut payload_bytes: u64 = 0;

    for (idx, count) in plan.into_iter().enumerate() {
        let (words, next_cursor) = source.generate(count, cursor);
        cursor = next_cursor;
        let bytes = to_network_bytes(&words);
        broadcast.publish(Topic::Data, &bytes);
        framer.push(&bytes, |frame| {
            link.transmit(session, &frame);
        });
        log::debug!(
            "Run {run_number}: message {idx} framed, next sequence {}, {} words pending",
            framer.sequence(),
            framer.pending_words()
        );
        events += words.len() as u64;
        payload_bytes += bytes.len() as u64;
        report(
            status,
            RunStatus::new(
                (idx + 1) as f32 / n_messages as f32,
                run_number,
                RunPhase::Generating,
            ),
        );
    }

    let last = framer.finish(|frame| {
        link.transmit(session, &frame);
    });
    link.transmit(session, &last);

    let summary = RunSummary {
        run_number,
        messages: n_messages,
        events,
        payload_bytes,
        frames: last.sequence + 1,
        link: link.take_stats(),
        elapsed: start.elapsed(),
    };
    report(status, RunStatus::new(1.0, run_number, RunPhase::Complete));
    log::info!(
        "Run {}: generated {} events in {} messages ({}) in {:.3} s",
        run_number,
        summary.events,
        summary.messages,
        human_bytes::human_bytes(summary.payload_bytes as f64),
        summary.elapsed.as_secs_f64()
    );
    log::info!(
        "Run {}: {} frames, {} transmitted, {} suppressed, {} failed",
        run_number,
        summary.frames,
        summary.link.frames_sent,
        summary.link.frames_suppressed,
        summary.link.send_errors
    );
    summary
}

/// Everything a triggered run needs, borrowed from the service for the duration of one command
pub struct RunContext<'a, E: ?Sized, B: ?Sized, S> {
    pub source: &'a mut E,
    pub broadcast: &'a mut B,
    pub session: &'a ArmingSession,
    pub link: &'a mut DataLink<S>,
    pub status: Option<&'a Sender<RunStatus>>,
    pub last_summary: Option<RunSummary>,
}

impl<E, B, S> RunTrigger for RunContext<'_, E, B, S>
where
    E: EventSource + ?Sized,
    B: Broadcast + ?Sized,
    S: DatagramSender,
{
    fn run(&mut self, run_number: u32) {
        log::info!("Starting run {run_number}");
        self.last_summary = Some(execute_run(
            run_number,
            &mut *self.source,
            &mut *self.broadcast,
            self.session,
            &mut *self.link,
            self.status,
        ));
    }

    fn complete(&mut self, run_number: u32) {
        self.broadcast.publish(Topic::Meta, &meta_payload(run_number));
    }
}
