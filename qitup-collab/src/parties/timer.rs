use std::time::Duration;

use log::debug;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

/// How often a timer was armed and disarmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub armed: bool,
    pub arms: usize,
    pub disarms: usize,
}

/// A single inactivity timeout, owned by a session worker.
///
/// When it fires, its generation is sent back to the worker, which ignores
/// generations that were disarmed in the meantime.
pub struct InactivityTimer {
    duration: Duration,
    fired: UnboundedSender<u64>,
    pending: Option<JoinHandle<()>>,
    generation: u64,
    stats: TimerStats,
}

impl InactivityTimer {
    pub fn new(duration: Duration, fired: UnboundedSender<u64>) -> Self {
        Self {
            duration,
            fired,
            pending: None,
            generation: 0,
            stats: Default::default(),
        }
    }

    /// Arms the timer unless it is already armed. Returns whether it was armed by this call.
    pub fn arm(&mut self) -> bool {
        if self.pending.is_some() {
            return false;
        }

        self.generation += 1;

        let generation = self.generation;
        let duration = self.duration;
        let fired = self.fired.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = fired.send(generation);
        }));

        self.stats.arms += 1;
        debug!("Inactivity timer armed for {}s", duration.as_secs());

        true
    }

    /// Disarms the timer if armed. Returns whether it was disarmed by this call.
    pub fn disarm(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };

        pending.abort();
        self.stats.disarms += 1;
        debug!("Inactivity timer cleared");

        true
    }

    /// Whether a fired generation belongs to the currently armed timer.
    pub fn is_current(&self, generation: u64) -> bool {
        self.pending.is_some() && generation == self.generation
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats {
            armed: self.pending.is_some(),
            ..self.stats
        }
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
