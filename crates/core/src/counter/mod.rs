use std::time::Duration;

use crate::{
    dom::{ElementId, SharedDom},
    timeline::Timeline,
    visibility::{RegistrationId, VisibilityObserver},
};

/// Outcome of advancing a counter by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterFrame {
    /// Intermediate value; another frame is needed.
    Continue(i64),
    /// Final value, exactly the target.
    Done(i64),
}

impl CounterFrame {
    pub fn value(self) -> i64 {
        match self {
            CounterFrame::Continue(value) | CounterFrame::Done(value) => value,
        }
    }
}

/// One numeric count-up from zero to a literal target value.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterRun {
    pub target: ElementId,
    pub end_value: i64,
    step: f64,
    current: f64,
    frames: u32,
}

impl CounterRun {
    /// The per-frame increment is `end_value / (duration / frame_interval)`.
    pub fn new(target: ElementId, end_value: i64, duration: Duration, frame_interval: Duration) -> Self {
        let frames = duration.as_secs_f64() / frame_interval.as_secs_f64();
        Self {
            target,
            end_value,
            step: end_value as f64 / frames,
            current: 0.0,
            frames: 0,
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of times [`CounterRun::advance`] has been called.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Adds one step. Once the accumulated value would reach the target the
    /// run snaps to it exactly, so float drift never overshoots.
    pub fn advance(&mut self) -> CounterFrame {
        self.frames += 1;
        self.current += self.step;
        let end = self.end_value as f64;
        let below = if end >= 0.0 {
            self.current < end
        } else {
            self.current > end
        };

        if below {
            CounterFrame::Continue(self.current.trunc() as i64)
        } else {
            self.current = end;
            CounterFrame::Done(self.end_value)
        }
    }
}

/// Leading-integer parse of a `data-count` style attribute. Returns `None`
/// when no digits lead the value.
pub fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}

/// Counts every matching display element up to its target value once the
/// watched section becomes visible.
#[derive(Debug, Clone)]
pub struct CounterAnimator {
    dom: SharedDom,
    class: String,
    attribute: String,
    duration: Duration,
    frame_interval: Duration,
}

impl CounterAnimator {
    pub fn new(
        dom: SharedDom,
        class: impl Into<String>,
        attribute: impl Into<String>,
        duration: Duration,
        frame_interval: Duration,
    ) -> Self {
        Self {
            dom,
            class: class.into(),
            attribute: attribute.into(),
            duration,
            frame_interval,
        }
    }

    /// Registers the count-up as a one-shot handler for `section`.
    pub fn attach<O>(self, observer: &mut O, section: ElementId, threshold: f64) -> Option<RegistrationId>
    where
        O: VisibilityObserver + ?Sized,
    {
        observer.observe(
            section,
            threshold,
            Box::new(move |_, timeline| {
                self.animate_all(timeline);
            }),
        )
    }

    /// Collects a run for each element carrying the class and a parsable
    /// target attribute.
    pub fn runs(&self) -> Vec<CounterRun> {
        let dom = self.dom.borrow();
        dom.elements_with_class(&self.class)
            .into_iter()
            .filter_map(|id| {
                let raw = dom.attribute(&id, &self.attribute)?;
                match parse_count(raw) {
                    Some(value) => Some(CounterRun::new(id, value, self.duration, self.frame_interval)),
                    None => {
                        tracing::debug!(element = %id, raw, "counter target is not a number; skipped");
                        None
                    }
                }
            })
            .collect()
    }

    /// Starts every run. The first step renders synchronously, later steps
    /// once per rendering frame. Returns the number of runs started.
    pub fn animate_all(&self, timeline: &mut Timeline) -> usize {
        let runs = self.runs();
        let count = runs.len();
        for run in runs {
            drive(run, self.dom.clone(), timeline);
        }
        count
    }
}

fn drive(mut run: CounterRun, dom: SharedDom, timeline: &mut Timeline) {
    let frame = run.advance();
    dom.borrow_mut()
        .set_text(&run.target, &frame.value().to_string());

    if let CounterFrame::Continue(_) = frame {
        timeline.request_frame(move |timeline| drive(run, dom, timeline));
    } else {
        tracing::debug!(element = %run.target, frames = run.frames(), "counter finished");
    }
}
