//! Per-surface height reporter.
//!
//! This is the state machine the measurement bootstrap runs inside each
//! embedded surface, expressed host-driven and deterministically clocked:
//! the driver pushes [`Trigger`]s as the surface observes them, calls
//! [`HeightReporter::poll`] at or after [`HeightReporter::next_deadline`], and
//! posts whatever [`HeightUpdate`] comes back.
//!
//! Throttling:
//! - every trigger restarts a trailing debounce window, so a burst yields one
//!   measurement;
//! - each debounced measurement spends one attempt, and attempts reset only
//!   when a new mutation burst starts, which bounds the resize feedback loop
//!   (host applies height → surface viewport resizes → re-measure). A burst is
//!   open from its first layout mutation until the flush it scheduled runs,
//!   whatever else is pending meanwhile;
//! - the safety poll ignores the attempt bound;
//! - heights within the noise threshold of the last report are not sent.

use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::RendererConfig;
use crate::measure::{HeightStrategy, LayoutProbe};
use crate::message::HeightUpdate;

/// Index of an image element, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

/// A DOM mutation record, reduced to what matters for layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Node insertion or removal anywhere in the subtree.
    ChildList,
    /// Attribute change on a descendant.
    Attribute(String),
}

impl MutationKind {
    /// Only structural changes and `style`/`class` changes can move layout.
    pub fn affects_layout(&self) -> bool {
        match self {
            MutationKind::ChildList => true,
            MutationKind::Attribute(name) => {
                name.eq_ignore_ascii_case("style") || name.eq_ignore_ascii_case("class")
            }
        }
    }
}

/// Something the surface observed that may have changed its height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The document finished loading.
    ContentReady,
    /// User scripts appended after the bootstrap have run.
    ScriptsExecuted,
    /// An image fired `load` or `error`.
    ImageSettled(ImageId),
    Mutation(MutationKind),
    /// The surface's own viewport was resized.
    ViewportResize,
    /// A click inside the surface; in-page navigation often follows.
    UserInteraction,
    /// The surface is being torn down.
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Loading,
    Ready,
    Disposed,
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub measurements: u64,
    pub emitted: u64,
    pub suppressed: u64,
    pub skipped_attempts: u64,
    pub probe_failures: u64,
}

pub struct HeightReporter {
    strategy: Box<dyn HeightStrategy>,
    noise_threshold: u32,
    debounce: Duration,
    poll_interval: Duration,
    max_attempts: u32,
    fallback_height: u32,

    phase: SurfacePhase,
    images: Vec<bool>,
    images_reported: bool,
    flush_at: Option<Duration>,
    mutation_burst: bool,
    next_poll: Option<Duration>,
    attempts: u32,
    last_sent: Option<u32>,
    last_measured: Option<u32>,
    stats: ReporterStats,
}

impl HeightReporter {
    pub fn new(config: &RendererConfig) -> Self {
        Self::with_strategy(config, config.strategy.strategy())
    }

    pub fn with_strategy(config: &RendererConfig, strategy: Box<dyn HeightStrategy>) -> Self {
        Self {
            strategy,
            noise_threshold: config.noise_threshold_px,
            debounce: config.debounce(),
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts,
            fallback_height: config.fallback_height_px,
            phase: SurfacePhase::Loading,
            images: Vec::new(),
            images_reported: false,
            flush_at: None,
            mutation_burst: false,
            next_poll: None,
            attempts: 0,
            last_sent: None,
            last_measured: None,
            stats: ReporterStats::default(),
        }
    }

    /// Declare how many image elements the surface contains.
    pub fn with_images(mut self, count: usize) -> Self {
        self.images = vec![false; count];
        self.images_reported = count == 0;
        self
    }

    pub fn phase(&self) -> SurfacePhase {
        self.phase
    }

    pub fn last_sent(&self) -> Option<u32> {
        self.last_sent
    }

    pub fn stats(&self) -> ReporterStats {
        self.stats
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True once every declared image has loaded or failed.
    pub fn images_complete(&self) -> bool {
        self.images.iter().all(|settled| *settled)
    }

    /// Earliest time [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.flush_at, self.next_poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn trigger(&mut self, now: Duration, trigger: Trigger) {
        if self.phase == SurfacePhase::Disposed {
            return;
        }
        match trigger {
            Trigger::ContentReady => {
                if self.phase == SurfacePhase::Loading {
                    self.phase = SurfacePhase::Ready;
                    self.next_poll = Some(now + self.poll_interval);
                }
                self.schedule(now);
            }
            Trigger::ScriptsExecuted => self.schedule(now),
            Trigger::ImageSettled(ImageId(index)) => {
                let Some(slot) = self.images.get_mut(index) else {
                    return;
                };
                *slot = true;
                if !self.images_reported && self.images_complete() {
                    self.images_reported = true;
                    self.schedule(now);
                }
            }
            Trigger::Mutation(kind) => {
                if !kind.affects_layout() {
                    return;
                }
                if !self.mutation_burst {
                    self.mutation_burst = true;
                    self.attempts = 0;
                }
                self.schedule(now);
            }
            Trigger::ViewportResize => self.schedule(now),
            Trigger::UserInteraction => {
                self.attempts = 0;
                self.schedule(now);
            }
            Trigger::Unload => {
                self.phase = SurfacePhase::Disposed;
                self.flush_at = None;
                self.mutation_burst = false;
                self.next_poll = None;
            }
        }
    }

    /// Run whatever is due at `now`. Returns the update to post, if any.
    pub fn poll(&mut self, now: Duration, probe: &dyn LayoutProbe) -> Option<HeightUpdate> {
        if self.phase == SurfacePhase::Disposed {
            return None;
        }

        let flush_due = self.flush_at.is_some_and(|at| at <= now);
        let poll_due = self.next_poll.is_some_and(|at| at <= now);

        let mut measure = false;
        if flush_due {
            self.flush_at = None;
            self.mutation_burst = false;
            if self.attempts < self.max_attempts {
                self.attempts += 1;
                measure = true;
            } else {
                self.stats.skipped_attempts += 1;
                trace!(attempts = self.attempts, "attempt bound reached, skipping measurement");
            }
        }
        if poll_due {
            self.next_poll = Some(now + self.poll_interval);
            measure = true;
        }

        if measure {
            self.measure_and_report(probe)
        } else {
            None
        }
    }

    fn schedule(&mut self, now: Duration) {
        self.flush_at = Some(now + self.debounce);
    }

    fn measure_and_report(&mut self, probe: &dyn LayoutProbe) -> Option<HeightUpdate> {
        self.stats.measurements += 1;
        let height = match self.strategy.measure(probe) {
            Ok(h) => {
                self.last_measured = Some(h);
                h
            }
            Err(e) => {
                self.stats.probe_failures += 1;
                let fallback = self.last_measured.unwrap_or(self.fallback_height);
                warn!(error = %e, fallback, "height measurement failed");
                fallback
            }
        };

        if let Some(prev) = self.last_sent {
            if prev.abs_diff(height) <= self.noise_threshold {
                self.stats.suppressed += 1;
                trace!(prev, height, "height change within noise threshold");
                return None;
            }
        }

        self.last_sent = Some(height);
        self.stats.emitted += 1;
        debug!(height, "reporting surface height");
        Some(HeightUpdate::new(height))
    }
}
