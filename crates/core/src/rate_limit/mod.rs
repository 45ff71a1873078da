//! Throttle and debounce combinators over arbitrary callbacks.
//!
//! Both are driven by the session [`Timeline`]: the throttle only needs the
//! current time, the debounce owns a pending timer it cancels on every call.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    time::Duration,
};

use crate::timeline::{TimerId, Timeline};

/// Runs its callback at most once per interval.
///
/// The first call of a burst runs immediately; calls that land inside the
/// window are dropped, not deferred.
pub struct Throttle<F> {
    interval: Duration,
    last_run: Option<Duration>,
    dropped: u64,
    callback: F,
}

impl<F> Throttle<F> {
    pub fn new(interval: Duration, callback: F) -> Self {
        Self {
            interval,
            last_run: None,
            dropped: 0,
            callback,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of calls dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Invokes the callback with `args` unless it already ran within the
    /// current window. Returns whether the callback ran.
    pub fn call<A>(&mut self, now: Duration, args: A) -> bool
    where
        F: FnMut(A),
    {
        let open = match self.last_run {
            Some(last) => now.saturating_sub(last) >= self.interval,
            None => true,
        };

        if open {
            self.last_run = Some(now);
            (self.callback)(args);
        } else {
            self.dropped += 1;
        }
        open
    }
}

impl<F> fmt::Debug for Throttle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("last_run", &self.last_run)
            .field("dropped", &self.dropped)
            .finish()
    }
}

type DebouncedFn<A> = Rc<RefCell<dyn FnMut(A, &mut Timeline)>>;

/// Runs its callback once input has been quiet for `delay`, with the
/// arguments of the last call in the burst.
pub struct Debounce<A> {
    delay: Duration,
    pending: Rc<Cell<Option<TimerId>>>,
    callback: DebouncedFn<A>,
}

impl<A: 'static> Debounce<A> {
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: FnMut(A, &mut Timeline) + 'static,
    {
        Self {
            delay,
            pending: Rc::new(Cell::new(None)),
            callback: Rc::new(RefCell::new(callback)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancels any scheduled run and schedules a new one `delay` from now.
    pub fn call(&self, timeline: &mut Timeline, args: A) {
        if let Some(previous) = self.pending.take() {
            timeline.cancel(previous);
        }

        let pending = Rc::clone(&self.pending);
        let callback = Rc::clone(&self.callback);
        let id = timeline.schedule(self.delay, move |timeline| {
            pending.set(None);
            let mut callback = callback.borrow_mut();
            (*callback)(args, timeline);
        });
        self.pending.set(Some(id));
    }

    /// Drops the scheduled run, if any.
    pub fn cancel(&self, timeline: &mut Timeline) -> bool {
        match self.pending.take() {
            Some(id) => timeline.cancel(id),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

/// Clones share the pending timer and the callback.
impl<A> Clone for Debounce<A> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            pending: Rc::clone(&self.pending),
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<A> fmt::Debug for Debounce<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("delay", &self.delay)
            .field("pending", &self.pending.get())
            .finish()
    }
}
