//! Interval timers behind a trait so the poll loop can run on real time or
//! on a virtual clock.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

pub trait Scheduler {
    fn start_interval(&mut self, every: Duration) -> TimerId;
    /// Cancelling an unknown or already-cancelled timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}

pub trait BlockingScheduler: Scheduler {
    /// Waits until the earliest active timer is due and returns it.
    /// `None` once no timer is active.
    fn wait_for_tick(&mut self) -> Option<TimerId>;
}

#[derive(Debug)]
struct Entry {
    every: Duration,
    next_due: Duration,
}

/// Active timers keyed by id; due times are offsets from the owner's origin.
#[derive(Debug, Default)]
struct Timers {
    next_id: u64,
    entries: BTreeMap<TimerId, Entry>,
}

impl Timers {
    fn start(&mut self, now: Duration, every: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.insert(
            id,
            Entry {
                every,
                next_due: now + every,
            },
        );
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Takes the earliest timer and schedules its next tick one interval
    /// after `max(due, now)`, so a late tick never leaves a backlog behind.
    fn pop_due(&mut self, now: Duration) -> Option<(TimerId, Duration)> {
        let (id, entry) = self
            .entries
            .iter_mut()
            .min_by_key(|(id, e)| (e.next_due, **id))?;
        let due = entry.next_due;
        entry.next_due = due.max(now) + entry.every;
        Some((*id, due))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Real-time scheduler; blocks the calling thread between ticks.
#[derive(Debug)]
pub struct SleepScheduler {
    origin: Instant,
    timers: Timers,
    fired: u32,
}

impl SleepScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            timers: Timers::default(),
            fired: 0,
        }
    }

    pub fn ticks_fired(&self) -> u32 {
        self.fired
    }
}

impl Default for SleepScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for SleepScheduler {
    fn start_interval(&mut self, every: Duration) -> TimerId {
        self.timers.start(self.origin.elapsed(), every)
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.cancel(id);
    }
}

impl BlockingScheduler for SleepScheduler {
    fn wait_for_tick(&mut self) -> Option<TimerId> {
        let elapsed = self.origin.elapsed();
        let (id, due) = self.timers.pop_due(elapsed)?;
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
        self.fired += 1;
        Some(id)
    }
}

/// Virtual-time scheduler. `wait_for_tick` jumps the clock straight to the
/// next due time, so tests run instantly and deterministically.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    timers: Timers,
    started: Vec<(TimerId, Duration)>,
    cancelled: Vec<TimerId>,
    fired: Vec<(TimerId, Duration)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Every `start_interval` call, with the requested interval.
    pub fn started(&self) -> &[(TimerId, Duration)] {
        &self.started
    }

    pub fn cancelled(&self) -> &[TimerId] {
        &self.cancelled
    }

    /// Every tick handed out, with the virtual time it fired at.
    pub fn fired(&self) -> &[(TimerId, Duration)] {
        &self.fired
    }
}

impl Scheduler for ManualScheduler {
    fn start_interval(&mut self, every: Duration) -> TimerId {
        let id = self.timers.start(self.now, every);
        self.started.push((id, every));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if self.timers.cancel(id) {
            self.cancelled.push(id);
        }
    }
}

impl BlockingScheduler for ManualScheduler {
    fn wait_for_tick(&mut self) -> Option<TimerId> {
        let (id, due) = self.timers.pop_due(self.now)?;
        self.now = due;
        self.fired.push((id, due));
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_timer_fires_first() {
        let mut s = ManualScheduler::new();
        let slow = s.start_interval(Duration::from_secs(3));
        let fast = s.start_interval(Duration::from_secs(2));

        assert_eq!(s.wait_for_tick(), Some(fast));
        assert_eq!(s.now(), Duration::from_secs(2));
        assert_eq!(s.wait_for_tick(), Some(slow));
        assert_eq!(s.wait_for_tick(), Some(fast));
        assert_eq!(s.now(), Duration::from_secs(4));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut s = ManualScheduler::new();
        let id = s.start_interval(Duration::from_secs(2));
        s.cancel(id);
        s.cancel(id);
        assert_eq!(s.cancelled(), &[id]);
        assert_eq!(s.wait_for_tick(), None);
    }

    #[test]
    fn late_tick_rebases_interval() {
        let mut timers = Timers::default();
        let id = timers.start(Duration::ZERO, Duration::from_secs(2));
        assert_eq!(timers.pop_due(Duration::ZERO), Some((id, Duration::from_secs(2))));
        // Handling ran until 9s: the overdue 4s tick fires once, then 11s.
        assert_eq!(timers.pop_due(Duration::from_secs(9)), Some((id, Duration::from_secs(4))));
        assert_eq!(timers.pop_due(Duration::from_secs(9)), Some((id, Duration::from_secs(11))));
    }

    #[test]
    fn sleep_scheduler_waits_after_slow_tick() {
        let every = Duration::from_millis(40);
        let mut s = SleepScheduler::new();
        let id = s.start_interval(every);
        assert_eq!(s.wait_for_tick(), Some(id));

        // Handling the tick took several intervals.
        std::thread::sleep(every * 5);

        let overdue = Instant::now();
        assert_eq!(s.wait_for_tick(), Some(id));
        assert!(overdue.elapsed() < every);

        let mut gaps = Vec::new();
        for _ in 0..3 {
            let t = Instant::now();
            assert_eq!(s.wait_for_tick(), Some(id));
            gaps.push(t.elapsed());
        }
        assert!(
            gaps.iter().all(|g| *g >= every / 2),
            "ticks fired back-to-back: {gaps:?}"
        );
        assert_eq!(s.ticks_fired(), 5);
    }
}
