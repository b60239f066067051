use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};

use super::config::SimulatorConfig;
use super::constants::{COARSE_TIMESTAMP_MODULUS, FINE_TIMESTAMP_RANGE, MAX_AMPLITUDE};
use super::encoder::{encode, Event, EventWords};
use super::error::SimulatorError;

/// Anything that can feed a run with encoded events.
///
/// A run asks once for its plan (how many events go in each message), then generates the
/// messages in order, threading the coarse timestamp cursor from one message to the next.
pub trait EventSource {
    /// Event count of every message of the next run
    fn plan_run(&mut self) -> Vec<usize>;

    /// Generate `count` events whose coarse timestamps continue from `cursor`.
    ///
    /// Returns the events and the cursor after the last one.
    fn generate(&mut self, count: usize, cursor: u32) -> (Vec<EventWords>, u32);
}

/// Simulator draws plausible-looking detector hits.
///
/// Pixels are uniform over the chips and channels, amplitudes follow a noisy line across the
/// channels of a chip, and hits are spaced by Poisson distributed clock ticks.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    message_size: Poisson<f64>,
    tick_gap: Poisson<f64>,
}

impl Simulator {
    /// Create a new Simulator. A seed of 0 draws the seed from entropy
    pub fn new(config: &SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;
        let message_size = Poisson::new(config.mean_events_per_message)
            .map_err(|_| SimulatorError::BadEventRate(config.mean_events_per_message))?;
        let tick_gap = Poisson::new(config.tick_gap())
            .map_err(|_| SimulatorError::BadExposure(config.simulated_exposure))?;
        let rng = if config.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(config.seed)
        };
        Ok(Self {
            config: config.clone(),
            rng,
            message_size,
            tick_gap,
        })
    }

    fn amplitude(&mut self, channel: u32) -> u32 {
        let noise: f64 = self.rng.sample(StandardNormal);
        let line = 1000.0 + 2000.0 * (channel as f64 / self.config.n_chans as f64);
        (noise * 100.0 + line).clamp(0.0, MAX_AMPLITUDE as f64) as u32
    }
}

impl EventSource for Simulator {
    fn plan_run(&mut self) -> Vec<usize> {
        (0..self.config.messages_per_run)
            .map(|_| self.message_size.sample(&mut self.rng) as usize)
            .collect()
    }

    fn generate(&mut self, count: usize, cursor: u32) -> (Vec<EventWords>, u32) {
        let n_pixels = self.config.n_chips * self.config.n_chans;
        let mut timestamp = cursor as u64;
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            let pixel = self.rng.gen_range(0..n_pixels);
            let channel = pixel % self.config.n_chans;
            let fine_timestamp = self.rng.gen_range(0..FINE_TIMESTAMP_RANGE);
            let amplitude = self.amplitude(channel);
            timestamp =
                (timestamp + self.tick_gap.sample(&mut self.rng) as u64) % COARSE_TIMESTAMP_MODULUS;
            events.push(encode(&Event {
                chip: pixel / self.config.n_chans,
                channel,
                fine_timestamp,
                amplitude,
                coarse_timestamp: timestamp as u32,
            }));
        }
        (events, timestamp as u32)
    }
}
