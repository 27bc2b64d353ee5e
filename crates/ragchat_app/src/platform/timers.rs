use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use ragchat_core::Timer;
use ragchat_logging::chat_trace;

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deadlines for the timers the core asked for. Rescheduling a timer
/// replaces its previous deadline.
pub struct TimerQueue<C: Clock> {
    clock: C,
    deadlines: BTreeMap<Timer, Instant>,
}

impl<C: Clock> TimerQueue<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            deadlines: BTreeMap::new(),
        }
    }

    pub fn schedule(&mut self, timer: Timer, after: Duration) {
        chat_trace!("schedule {:?} in {:?}", timer, after);
        let deadline = self.clock.now() + after;
        self.deadlines.insert(timer, deadline);
    }

    pub fn cancel(&mut self, timer: &Timer) {
        if self.deadlines.remove(timer).is_some() {
            chat_trace!("cancel {:?}", timer);
        }
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    /// `None` when nothing is scheduled.
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.deadlines
            .values()
            .min()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Removes and returns every due timer, earliest deadline first.
    pub fn take_due(&mut self) -> Vec<Timer> {
        let now = self.clock.now();
        let mut due: Vec<(Instant, Timer)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(timer, deadline)| (*deadline, *timer))
            .collect();
        due.sort();
        for (_, timer) in &due {
            self.deadlines.remove(timer);
        }
        due.into_iter().map(|(_, timer)| timer).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use ragchat_core::RequestId;

    #[derive(Clone)]
    pub(crate) struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    #[test]
    fn due_timers_come_out_in_deadline_order() {
        let clock = ManualClock::new();
        let mut queue = TimerQueue::new(clock.clone());
        queue.schedule(Timer::HideHold { generation: 1 }, Duration::from_secs(2));
        queue.schedule(Timer::Heartbeat { generation: 1 }, Duration::from_secs(1));
        queue.schedule(
            Timer::QueryTimeout {
                request_id: RequestId::new(1),
            },
            Duration::from_secs(120),
        );
        assert_eq!(queue.time_until_next(), Some(Duration::from_secs(1)));
        assert!(queue.take_due().is_empty());

        clock.advance(Duration::from_secs(3));
        assert_eq!(
            queue.take_due(),
            vec![
                Timer::Heartbeat { generation: 1 },
                Timer::HideHold { generation: 1 }
            ]
        );
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn rescheduling_replaces_the_deadline() {
        let clock = ManualClock::new();
        let mut queue = TimerQueue::new(clock.clone());
        let timer = Timer::UploadRamp { job_id: 1 };
        queue.schedule(timer, Duration::from_millis(200));
        clock.advance(Duration::from_millis(150));
        queue.schedule(timer, Duration::from_millis(200));
        clock.advance(Duration::from_millis(100));
        assert!(queue.take_due().is_empty());
        clock.advance(Duration::from_millis(100));
        assert_eq!(queue.take_due(), vec![timer]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let clock = ManualClock::new();
        let mut queue = TimerQueue::new(clock.clone());
        let timer = Timer::UploadStatusClear { generation: 4 };
        queue.schedule(timer, Duration::from_secs(5));
        queue.cancel(&timer);
        clock.advance(Duration::from_secs(10));
        assert!(queue.take_due().is_empty());
        assert_eq!(queue.time_until_next(), None);
    }
}
