use std::{collections::VecDeque, time::Duration};

use crate::{
    dom::{ElementId, SharedDom},
    timeline::Timeline,
};

/// Up up down down left right left right B A.
pub const KONAMI_CODE: [u32; 10] = [38, 38, 40, 40, 37, 39, 37, 39, 66, 65];

/// Rolling buffer of the most recent key codes, as long as the sequence it
/// waits for.
#[derive(Debug, Clone)]
pub struct KeySequenceDetector {
    sequence: Vec<u32>,
    buffer: VecDeque<u32>,
}

impl KeySequenceDetector {
    pub fn new(sequence: impl Into<Vec<u32>>) -> Self {
        let sequence = sequence.into();
        Self {
            buffer: VecDeque::with_capacity(sequence.len()),
            sequence,
        }
    }

    pub fn konami() -> Self {
        Self::new(KONAMI_CODE)
    }

    /// Records `code` and reports whether the buffer now ends with the full
    /// sequence.
    pub fn push(&mut self, code: u32) -> bool {
        if self.sequence.is_empty() {
            return false;
        }
        if self.buffer.len() == self.sequence.len() {
            self.buffer.pop_front();
        }
        self.buffer.push_back(code);
        self.buffer.iter().eq(self.sequence.iter())
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Spins the page body once.
#[derive(Debug, Clone)]
pub struct SpinEffect {
    dom: SharedDom,
    body: ElementId,
    duration: Duration,
}

impl SpinEffect {
    pub fn new(dom: SharedDom, body: ElementId, duration: Duration) -> Self {
        Self {
            dom,
            body,
            duration,
        }
    }

    pub fn play(&self, timeline: &mut Timeline) -> bool {
        {
            let mut dom = self.dom.borrow_mut();
            if !dom.contains(&self.body) {
                return false;
            }
            dom.set_style(&self.body, "transition", "transform 2s ease");
            dom.set_style(&self.body, "transform", "rotate(360deg)");
        }
        tracing::info!("secret sequence entered");

        let dom = self.dom.clone();
        let body = self.body.clone();
        timeline.schedule(self.duration, move |_| {
            dom.borrow_mut().remove_style(&body, "transform");
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, Element};

    #[test]
    fn matches_only_the_complete_sequence() {
        let mut detector = KeySequenceDetector::konami();
        let (last, head) = KONAMI_CODE.split_last().unwrap();
        for code in head {
            assert!(!detector.push(*code));
        }
        assert!(detector.push(*last));
    }

    #[test]
    fn leading_noise_is_shifted_out() {
        let mut detector = KeySequenceDetector::konami();
        for code in [13, 38, 27] {
            detector.push(code);
        }
        let hits = KONAMI_CODE.iter().filter(|code| detector.push(**code)).count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn reset_forgets_partial_input() {
        let mut detector = KeySequenceDetector::new(vec![1, 2]);
        detector.push(1);
        detector.reset();
        assert!(!detector.push(2));
        assert!(!detector.push(1));
        assert!(detector.push(2));
    }

    #[test]
    fn spin_clears_transform_after_duration() {
        let mut dom = Dom::new();
        dom.insert(Element::new("body", "body"));
        let dom = dom.into_shared();
        let effect = SpinEffect::new(dom.clone(), "body".into(), Duration::from_millis(2000));
        let mut timeline = Timeline::default();

        assert!(effect.play(&mut timeline));
        assert_eq!(dom.borrow().style(&"body".into(), "transform"), Some("rotate(360deg)"));

        timeline.advance(Duration::from_millis(2000));
        assert_eq!(dom.borrow().style(&"body".into(), "transform"), None);
    }
}
