//! Cooperative tick scheduling.
//!
//! The engine never owns a thread. It asks a [`TickScheduler`] for a
//! recurring tick and gets back a [`TickHandle`]; the host delivers each
//! firing by calling [`crate::RoutineEngine::on_tick`] with that handle.
//! Ticks carrying a handle the engine has already cancelled are ignored.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Countdown resolution.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Identifies one scheduled recurring tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// Recurring tick capability injected into the engine
pub trait TickScheduler {
    fn schedule_tick(&mut self, interval: Duration) -> TickHandle;
    fn cancel(&mut self, handle: TickHandle);
}

#[derive(Debug)]
struct ScheduledTick {
    handle: TickHandle,
    interval_ms: u64,
    next_due_ms: u64,
}

#[derive(Debug, Default)]
struct Timeline {
    now_ms: u64,
    next_id: u64,
    active: Vec<ScheduledTick>,
}

/// Virtual-time scheduler. Clones share one timeline.
///
/// Time only moves when [`VirtualTicker::advance`] is called, which makes
/// it suitable both for tests and for a host loop that sleeps between
/// advances.
#[derive(Clone, Debug, Default)]
pub struct VirtualTicker {
    timeline: Rc<RefCell<Timeline>>,
}

impl VirtualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward and return the handles that fell due.
    ///
    /// Each schedule fires at most once per call, so hosts should advance
    /// by no more than one interval at a time.
    pub fn advance(&self, by: Duration) -> Vec<TickHandle> {
        let mut timeline = self.timeline.borrow_mut();
        timeline.now_ms += by.as_millis() as u64;
        let now = timeline.now_ms;

        let mut due = Vec::new();
        for tick in timeline.active.iter_mut() {
            if tick.next_due_ms <= now {
                due.push(tick.handle);
                tick.next_due_ms += tick.interval_ms;
            }
        }
        due
    }

    /// Number of live schedules.
    pub fn active_count(&self) -> usize {
        self.timeline.borrow().active.len()
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.timeline.borrow().now_ms)
    }
}

impl TickScheduler for VirtualTicker {
    fn schedule_tick(&mut self, interval: Duration) -> TickHandle {
        let mut timeline = self.timeline.borrow_mut();
        timeline.next_id += 1;
        let handle = TickHandle(timeline.next_id);
        let interval_ms = (interval.as_millis() as u64).max(1);
        let next_due_ms = timeline.now_ms + interval_ms;
        timeline.active.push(ScheduledTick {
            handle,
            interval_ms,
            next_due_ms,
        });
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.timeline
            .borrow_mut()
            .active
            .retain(|tick| tick.handle != handle);
    }
}
