use std::time::Duration;

use crate::{
    dom::{ElementId, SharedDom},
    timeline::Timeline,
    visibility::{RegistrationId, VisibilityObserver},
};

/// Styles applied before an element is revealed. The host's own transition
/// interpolates between the hidden and revealed styles.
const HIDDEN_STYLE: [(&str, &str); 3] = [
    ("opacity", "0"),
    ("transform", "translateY(30px)"),
    ("transition", "opacity 0.6s ease, transform 0.6s ease"),
];

const REVEALED_STYLE: [(&str, &str); 2] = [("opacity", "1"), ("transform", "translateY(0)")];

/// Staggered opacity/position reveal of a group of elements.
#[derive(Debug, Clone)]
pub struct RevealAnimator {
    dom: SharedDom,
    stagger: Duration,
}

impl RevealAnimator {
    pub fn new(dom: SharedDom, stagger: Duration) -> Self {
        Self { dom, stagger }
    }

    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Puts `targets` into their hidden starting state.
    pub fn prepare(&self, targets: &[ElementId]) {
        let mut dom = self.dom.borrow_mut();
        for target in targets {
            for (property, value) in HIDDEN_STYLE {
                dom.set_style(target, property, value);
            }
        }
    }

    /// Schedules the reveal of `target` after `index` stagger steps.
    pub fn reveal_at(&self, target: ElementId, index: usize, timeline: &mut Timeline) {
        let dom = self.dom.clone();
        let steps = u32::try_from(index).unwrap_or(u32::MAX);
        let delay = self.stagger.saturating_mul(steps);
        timeline.schedule(delay, move |_| {
            let mut dom = dom.borrow_mut();
            for (property, value) in REVEALED_STYLE {
                dom.set_style(&target, property, value);
            }
        });
    }

    /// Reveals every element with `class`, the i-th one `i * stagger` later.
    pub fn reveal_class(&self, class: &str, timeline: &mut Timeline) -> usize {
        let targets = self.dom.borrow().elements_with_class(class);
        let count = targets.len();
        for (index, target) in targets.into_iter().enumerate() {
            self.reveal_at(target, index, timeline);
        }
        count
    }

    /// Reveals the elements with `class` once `section` becomes visible.
    pub fn attach_group<O>(
        self,
        observer: &mut O,
        section: ElementId,
        threshold: f64,
        class: String,
    ) -> Option<RegistrationId>
    where
        O: VisibilityObserver + ?Sized,
    {
        observer.observe(
            section,
            threshold,
            Box::new(move |_, timeline| {
                let count = self.reveal_class(&class, timeline);
                tracing::debug!(class = %class, count, "group reveal scheduled");
            }),
        )
    }

    /// Hides each observable target and reveals it on its own first
    /// visibility. Targets that become visible in the same pass are staggered
    /// by their position in that pass.
    pub fn attach_each<O>(self, observer: &mut O, targets: &[ElementId], threshold: f64) -> usize
    where
        O: VisibilityObserver + ?Sized,
    {
        let mut observed = 0;
        for target in targets {
            let animator = self.clone();
            let registration = observer.observe(
                target.clone(),
                threshold,
                Box::new(move |entry, timeline| {
                    animator.reveal_at(entry.target.clone(), entry.batch_index, timeline)
                }),
            );
            if registration.is_some() {
                self.prepare(std::slice::from_ref(target));
                observed += 1;
            }
        }
        observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dom::{Dom, Element},
        visibility::{dispatch_all, ManualObserver},
    };

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn brands(count: usize) -> SharedDom {
        let mut dom = Dom::new();
        dom.insert(Element::new("skills", "section"));
        for index in 0..count {
            dom.insert(Element::new(format!("brand-{index}"), "div").with_class("skill-brand"));
        }
        dom.into_shared()
    }

    fn opacity(dom: &SharedDom, id: &str) -> Option<String> {
        dom.borrow().style(&id.into(), "opacity").map(str::to_string)
    }

    #[test]
    fn group_reveal_is_staggered_by_index() {
        let dom = brands(3);
        let animator = RevealAnimator::new(dom.clone(), ms(100));
        let mut observer = ManualObserver::new();
        let mut timeline = Timeline::default();

        animator
            .attach_group(&mut observer, "skills".into(), 0.3, "skill-brand".to_string())
            .unwrap();
        dispatch_all(observer.trigger(&"skills".into(), 0.5), &mut timeline);

        timeline.advance(Duration::ZERO);
        assert_eq!(opacity(&dom, "brand-0").as_deref(), Some("1"));
        assert_eq!(opacity(&dom, "brand-1"), None);

        timeline.advance(ms(100));
        assert_eq!(opacity(&dom, "brand-1").as_deref(), Some("1"));
        assert_eq!(opacity(&dom, "brand-2"), None);

        timeline.advance(ms(100));
        assert_eq!(opacity(&dom, "brand-2").as_deref(), Some("1"));
        assert_eq!(
            dom.borrow().style(&"brand-2".into(), "transform"),
            Some("translateY(0)")
        );
    }

    #[test]
    fn huge_stagger_saturates_instead_of_overflowing() {
        let dom = brands(3);
        let animator = RevealAnimator::new(dom.clone(), Duration::MAX);
        let mut timeline = Timeline::default();

        assert_eq!(animator.reveal_class("skill-brand", &mut timeline), 3);
        timeline.advance(Duration::ZERO);
        assert_eq!(opacity(&dom, "brand-0").as_deref(), Some("1"));
        assert_eq!(opacity(&dom, "brand-1"), None);
        assert_eq!(timeline.pending_timers(), 2);
    }

    #[test]
    fn each_target_is_hidden_then_revealed_once() {
        let mut dom = Dom::new();
        dom.insert(Element::new("card-a", "div").with_class("project-card"));
        dom.insert(Element::new("card-b", "div").with_class("project-card"));
        let dom = dom.into_shared();
        let animator = RevealAnimator::new(dom.clone(), ms(100));
        let mut observer = ManualObserver::new();
        let mut timeline = Timeline::default();
        let cards = dom.borrow().elements_with_class("project-card");

        assert_eq!(animator.attach_each(&mut observer, &cards, 0.1), 2);
        assert_eq!(opacity(&dom, "card-a").as_deref(), Some("0"));

        dispatch_all(observer.trigger(&"card-b".into(), 0.2), &mut timeline);
        timeline.advance(Duration::ZERO);
        assert_eq!(opacity(&dom, "card-b").as_deref(), Some("1"));
        assert_eq!(opacity(&dom, "card-a").as_deref(), Some("0"));

        dom.borrow_mut().take_mutations();
        dispatch_all(observer.trigger(&"card-b".into(), 1.0), &mut timeline);
        timeline.advance(ms(500));
        assert!(dom.borrow_mut().take_mutations().is_empty());
    }
}
