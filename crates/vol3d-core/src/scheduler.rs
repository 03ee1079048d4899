//! Re-render scheduling: throttled control changes, debounced resizes, and reduced
//! resolution while dragging.
//!
//! Everything here is driven by explicit calls with an explicit `now`; nothing spawns
//! threads or timers. The host loop asks [`Scheduler::next_deadline`] when to wake up.

use std::time::{Duration, Instant};

use glam::UVec2;

/// Default delay between the last resize event and the resize being applied.
pub const DEFAULT_RESIZE_DELAY: Duration = Duration::from_millis(200);

/// Admits at most one high-frequency change per rendered frame.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleGate {
    open: bool,
}

impl ThrottleGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self { open: true }
    }

    /// Reopens the gate after a frame has been rendered.
    pub fn mark_rendered(&mut self) {
        self.open = true;
    }

    /// Consumes the gate. Returns `false` if it was already consumed since the last
    /// rendered frame, in which case the change must be dropped.
    pub fn try_consume(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Hands back an admission whose change was not applied.
    pub fn release(&mut self) {
        self.open = true;
    }

    /// Returns whether a change would currently be admitted.
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Delays a resize until no further resize has arrived for a fixed interval.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    delay: Duration,
    pending: Option<(UVec2, Instant)>,
}

impl ResizeDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Records a resize, restarting the delay.
    pub fn request(&mut self, size: UVec2, now: Instant) {
        self.pending = Some((size, now + self.delay));
    }

    /// Returns the latest requested size once its delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<UVec2> {
        match self.pending {
            Some((size, deadline)) if now >= deadline => {
                self.pending = None;
                Some(size)
            }
            _ => None,
        }
    }

    /// Returns when the pending resize becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, deadline)| deadline)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Tracks whether a pointer drag is in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionSpeedup {
    active: bool,
}

impl InteractionSpeedup {
    pub fn begin(&mut self) {
        self.active = true;
    }

    pub fn end(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the factor to divide the render resolution by.
    pub fn resolution_divisor(&self, speedup: f32) -> f32 {
        if self.active && speedup > 1.0 {
            speedup
        } else {
            1.0
        }
    }
}

/// Divides a physical size by `divisor`, keeping at least one pixel per axis.
pub fn scaled_size(size: UVec2, divisor: f32) -> UVec2 {
    if divisor <= 1.0 {
        return size.max(UVec2::ONE);
    }
    let scaled = (size.as_vec2() / divisor).round().as_uvec2();
    scaled.max(UVec2::ONE)
}

/// The viewer's scheduling state.
#[derive(Debug, Clone)]
pub struct Scheduler {
    gate: ThrottleGate,
    resize: ResizeDebouncer,
    speedup: InteractionSpeedup,
}

impl Scheduler {
    pub fn new(resize_delay: Duration) -> Self {
        Self {
            gate: ThrottleGate::new(),
            resize: ResizeDebouncer::new(resize_delay),
            speedup: InteractionSpeedup::default(),
        }
    }

    /// Records a completed frame.
    pub fn frame_rendered(&mut self) {
        self.gate.mark_rendered();
    }

    /// Decides whether a throttled change may be applied now.
    pub fn admit_throttled(&mut self) -> bool {
        let admitted = self.gate.try_consume();
        if !admitted {
            log::trace!("Dropping throttled change until the next frame");
        }
        admitted
    }

    /// Reopens the gate for a change that was admitted but rolled back.
    pub fn release_throttled(&mut self) {
        self.gate.release();
    }

    pub fn request_resize(&mut self, size: UVec2, now: Instant) {
        self.resize.request(size, now);
    }

    pub fn poll_resize(&mut self, now: Instant) -> Option<UVec2> {
        self.resize.poll(now)
    }

    /// Returns when the host should next call [`Scheduler::poll_resize`].
    pub fn next_deadline(&self) -> Option<Instant> {
        self.resize.deadline()
    }

    pub fn begin_interaction(&mut self) {
        self.speedup.begin();
    }

    pub fn end_interaction(&mut self) {
        self.speedup.end();
    }

    pub fn is_interacting(&self) -> bool {
        self.speedup.is_active()
    }

    pub fn resolution_divisor(&self, speedup: f32) -> f32 {
        self.speedup.resolution_divisor(speedup)
    }

    pub fn gate(&self) -> &ThrottleGate {
        &self.gate
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RESIZE_DELAY)
    }
}
