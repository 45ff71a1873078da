use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    fmt,
    time::Duration,
};

/// Deferred unit of work. Tasks receive the timeline so they can schedule
/// their own follow-ups.
pub type Task = Box<dyn FnOnce(&mut Timeline)>;

/// Handle to a pending timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Deterministic, single-threaded event loop in virtual time.
///
/// Delayed timers and rendering-frame callbacks are the only two ways work is
/// suspended. Nothing runs until the host advances the clock, which makes the
/// whole engine reproducible under test.
pub struct Timeline {
    now: Duration,
    frame_interval: Duration,
    next_id: u64,
    queue: BinaryHeap<Reverse<(Duration, u64)>>,
    tasks: HashMap<u64, Task>,
    frames: Vec<Task>,
    frames_run: u64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl Timeline {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            now: Duration::ZERO,
            frame_interval: frame_interval.max(Duration::from_micros(1)),
            next_id: 0,
            queue: BinaryHeap::new(),
            tasks: HashMap::new(),
            frames: Vec::new(),
            frames_run: 0,
        }
    }

    /// Current virtual time since the session started.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Schedules `task` to run `delay` after the current time. A zero delay
    /// still defers the task to the next advance.
    pub fn schedule<F>(&mut self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce(&mut Timeline) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Reverse((self.now.saturating_add(delay), id)));
        self.tasks.insert(id, Box::new(task));
        TimerId(id)
    }

    /// Drops a pending timer. Returns `false` when it already ran or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.tasks.remove(&id.0).is_some()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.tasks.contains_key(&id.0)
    }

    /// Queues `task` for the next rendering frame.
    pub fn request_frame<F>(&mut self, task: F)
    where
        F: FnOnce(&mut Timeline) + 'static,
    {
        self.frames.push(Box::new(task));
    }

    pub fn pending_timers(&self) -> usize {
        self.tasks.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of rendering frames that have run callbacks so far.
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Advances the clock by `by`, running everything that falls due.
    pub fn advance(&mut self, by: Duration) -> usize {
        let target = self.now.saturating_add(by);
        self.advance_to(target)
    }

    /// Runs every timer and frame due at or before `target` in time order and
    /// leaves the clock at `target`. Timers win ties against frames; timers
    /// due at the same instant run in the order they were scheduled.
    pub fn advance_to(&mut self, target: Duration) -> usize {
        let mut ran = 0;

        loop {
            let next_timer = self.next_timer_due().filter(|due| *due <= target);
            let next_frame = if self.frames.is_empty() {
                None
            } else {
                Some(self.next_frame_boundary()).filter(|due| *due <= target)
            };

            match (next_timer, next_frame) {
                (Some(timer), Some(frame)) if frame < timer => ran += self.run_frame(frame),
                (Some(_), _) => ran += self.run_next_timer(),
                (None, Some(frame)) => ran += self.run_frame(frame),
                (None, None) => break,
            }
        }

        if target > self.now {
            self.now = target;
        }
        ran
    }

    /// Drops every pending timer and frame callback.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.tasks.clear();
        self.frames.clear();
    }

    fn next_timer_due(&mut self) -> Option<Duration> {
        while let Some(Reverse((due, id))) = self.queue.peek().copied() {
            if self.tasks.contains_key(&id) {
                return Some(due);
            }
            // Cancelled timers are removed lazily.
            self.queue.pop();
        }
        None
    }

    fn run_next_timer(&mut self) -> usize {
        let Some(Reverse((due, id))) = self.queue.pop() else {
            return 0;
        };
        let Some(task) = self.tasks.remove(&id) else {
            return 0;
        };
        self.now = self.now.max(due);
        tracing::trace!(at_ms = self.now.as_millis() as u64, timer = id, "running timer");
        task(self);
        1
    }

    fn run_frame(&mut self, at: Duration) -> usize {
        self.now = self.now.max(at);
        self.frames_run += 1;
        let frame = std::mem::take(&mut self.frames);
        let count = frame.len();
        for task in frame {
            task(self);
        }
        count
    }

    fn next_frame_boundary(&self) -> Duration {
        let interval = self.frame_interval.as_micros();
        let elapsed = self.now.as_micros();
        let next = (elapsed / interval + 1) * interval;
        Duration::from_micros(next as u64)
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("now", &self.now)
            .field("frame_interval", &self.frame_interval)
            .field("pending_timers", &self.tasks.len())
            .field("pending_frames", &self.frames.len())
            .field("frames_run", &self.frames_run)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn runs_timers_in_due_order() {
        let mut timeline = Timeline::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, label) in [(30, "c"), (10, "a"), (20, "b"), (10, "a2")] {
            let log = Rc::clone(&log);
            timeline.schedule(ms(delay), move |timeline| {
                log.borrow_mut().push((label, timeline.now()));
            });
        }

        assert_eq!(timeline.advance(ms(25)), 3);
        assert_eq!(
            *log.borrow(),
            vec![("a", ms(10)), ("a2", ms(10)), ("b", ms(20))]
        );
        assert_eq!(timeline.now(), ms(25));
        assert_eq!(timeline.pending_timers(), 1);
    }

    #[test]
    fn cancelled_timers_never_run() {
        let mut timeline = Timeline::default();
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        let id = timeline.schedule(ms(5), move |_| *flag.borrow_mut() = true);

        assert!(timeline.cancel(id));
        assert!(!timeline.cancel(id));
        timeline.advance(ms(10));
        assert!(!*fired.borrow());
    }

    #[test]
    fn tasks_can_reschedule_themselves() {
        fn tick(count: Rc<RefCell<u32>>, timeline: &mut Timeline) {
            *count.borrow_mut() += 1;
            timeline.schedule(Duration::from_millis(10), move |timeline| tick(count, timeline));
        }

        let mut timeline = Timeline::default();
        let count = Rc::new(RefCell::new(0));
        let first = Rc::clone(&count);
        timeline.schedule(ms(10), move |timeline| tick(first, timeline));

        timeline.advance(ms(55));
        assert_eq!(*count.borrow(), 5);
        assert_eq!(timeline.pending_timers(), 1);
    }

    #[test]
    fn frames_run_on_interval_boundaries() {
        let mut timeline = Timeline::new(ms(16));
        let stamps = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&stamps);
        timeline.request_frame(move |timeline| {
            log.borrow_mut().push(timeline.now());
            let log = Rc::clone(&log);
            timeline.request_frame(move |timeline| log.borrow_mut().push(timeline.now()));
        });

        timeline.advance(ms(40));
        assert_eq!(*stamps.borrow(), vec![ms(16), ms(32)]);
        assert_eq!(timeline.frames_run(), 2);
    }

    #[test]
    fn zero_delay_defers_until_advance() {
        let mut timeline = Timeline::default();
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        timeline.schedule(Duration::ZERO, move |_| *flag.borrow_mut() = true);

        assert!(!*fired.borrow());
        timeline.advance(Duration::ZERO);
        assert!(*fired.borrow());
    }
}
