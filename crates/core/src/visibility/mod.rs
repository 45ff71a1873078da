//! Visibility-triggered one-shot dispatch.
//!
//! A registration pairs a target element with the visible fraction it must
//! reach and a handler. Handlers are `FnOnce`: once a registration fires it
//! is retired and can never fire again, however often the target scrolls in
//! and out of view afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    dom::{ElementId, Rect, SharedDom},
    timeline::Timeline,
};

/// Handler invoked the first time a target becomes visible enough.
pub type OneShot = Box<dyn FnOnce(&VisibilityEntry, &mut Timeline)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// Visible region of the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_y: 0.0,
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    /// Fraction of `rect` inside the viewport, in `[0, 1]`. Zero-height
    /// elements count as fully visible while their top edge is on screen.
    pub fn visible_fraction(&self, rect: Rect) -> f64 {
        let view_top = self.scroll_y;
        let view_bottom = self.scroll_y + self.height;

        if rect.height <= 0.0 {
            return if rect.top >= view_top && rect.top < view_bottom {
                1.0
            } else {
                0.0
            };
        }

        let overlap = (rect.top + rect.height).min(view_bottom) - rect.top.max(view_top);
        (overlap.max(0.0) / rect.height).clamp(0.0, 1.0)
    }

    /// The same viewport with its bottom edge pulled up by `margin` pixels.
    pub fn inset_bottom(self, margin: f64) -> Self {
        Self {
            height: (self.height - margin).max(0.0),
            ..self
        }
    }
}

/// What a handler learns about the observation that fired it.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityEntry {
    pub target: ElementId,
    pub fraction: f64,
    /// Position among the registrations fired by the same observation pass.
    pub batch_index: usize,
}

/// A registration that crossed its threshold, detached from its observer.
pub struct Fired {
    pub entry: VisibilityEntry,
    handler: OneShot,
}

impl Fired {
    pub fn dispatch(self, timeline: &mut Timeline) {
        tracing::debug!(element = %self.entry.target, fraction = self.entry.fraction, "first visible");
        (self.handler)(&self.entry, timeline);
    }
}

impl fmt::Debug for Fired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fired").field("entry", &self.entry).finish()
    }
}

/// Runs handlers returned by an observation pass. Observers hand fired
/// registrations back instead of running them so handlers never execute while
/// the observer is borrowed.
pub fn dispatch_all(fired: Vec<Fired>, timeline: &mut Timeline) -> usize {
    let count = fired.len();
    for item in fired {
        item.dispatch(timeline);
    }
    count
}

/// Capability to watch a target and run a handler on first visibility.
pub trait VisibilityObserver {
    /// Starts watching `target`. Returns `None` when the observer cannot watch
    /// it, in which case the handler is dropped without running.
    fn observe(&mut self, target: ElementId, threshold: f64, handler: OneShot)
        -> Option<RegistrationId>;

    /// Stops watching a registration that has not fired yet.
    fn unobserve(&mut self, id: RegistrationId) -> bool;

    /// Number of registrations still waiting to fire.
    fn pending(&self) -> usize;
}

struct Registration {
    id: RegistrationId,
    target: ElementId,
    threshold: f64,
    handler: OneShot,
}

/// Bookkeeping shared by every observer variant.
#[derive(Default)]
struct Registry {
    registrations: Vec<Registration>,
    next_id: u64,
}

impl Registry {
    fn register(&mut self, target: ElementId, threshold: f64, handler: OneShot) -> RegistrationId {
        let id = RegistrationId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            target,
            threshold: threshold.clamp(0.0, 1.0),
            handler,
        });
        id
    }

    fn remove(&mut self, id: RegistrationId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|registration| registration.id != id);
        before != self.registrations.len()
    }

    /// Retires every registration whose target is visible enough and returns
    /// them in registration order.
    fn take_fired<F>(&mut self, mut fraction_of: F) -> Vec<Fired>
    where
        F: FnMut(&ElementId) -> Option<f64>,
    {
        let mut fired = Vec::new();
        let mut waiting = Vec::with_capacity(self.registrations.len());

        for registration in self.registrations.drain(..) {
            let fraction = fraction_of(&registration.target);
            match fraction {
                Some(fraction) if fraction > 0.0 && fraction >= registration.threshold => {
                    fired.push(Fired {
                        entry: VisibilityEntry {
                            target: registration.target,
                            fraction,
                            batch_index: fired.len(),
                        },
                        handler: registration.handler,
                    });
                }
                _ => waiting.push(registration),
            }
        }

        self.registrations = waiting;
        fired
    }
}

/// Observer backed by element geometry and the current viewport, polled by
/// the session on load, scroll and resize.
pub struct ViewportObserver {
    dom: SharedDom,
    registry: Registry,
    bottom_margin: f64,
}

impl ViewportObserver {
    pub fn new(dom: SharedDom) -> Self {
        Self {
            dom,
            registry: Registry::default(),
            bottom_margin: 0.0,
        }
    }

    /// Shrinks the observed area by `margin` pixels at the bottom, so targets
    /// must scroll that far into view before they count as visible.
    pub fn with_bottom_margin(mut self, margin: f64) -> Self {
        self.bottom_margin = margin.max(0.0);
        self
    }

    /// Evaluates every pending registration against `viewport`.
    pub fn poll(&mut self, viewport: Viewport) -> Vec<Fired> {
        if self.registry.registrations.is_empty() {
            return Vec::new();
        }
        let viewport = viewport.inset_bottom(self.bottom_margin);
        let dom = self.dom.borrow();
        self.registry
            .take_fired(|target| dom.rect(target).map(|rect| viewport.visible_fraction(rect)))
    }
}

impl VisibilityObserver for ViewportObserver {
    fn observe(
        &mut self,
        target: ElementId,
        threshold: f64,
        handler: OneShot,
    ) -> Option<RegistrationId> {
        let geometry = self.dom.borrow().rect(&target);
        if geometry.is_none() {
            tracing::debug!(element = %target, "visibility target has no geometry; not observing");
            return None;
        }
        Some(self.registry.register(target, threshold, handler))
    }

    fn unobserve(&mut self, id: RegistrationId) -> bool {
        self.registry.remove(id)
    }

    fn pending(&self) -> usize {
        self.registry.registrations.len()
    }
}

impl fmt::Debug for ViewportObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportObserver")
            .field("pending", &self.pending())
            .field("bottom_margin", &self.bottom_margin)
            .finish()
    }
}

/// Deterministic observer for tests and hosts without layout: visibility is
/// reported explicitly through [`ManualObserver::trigger`].
#[derive(Default)]
pub struct ManualObserver {
    registry: Registry,
}

impl ManualObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports that `target` is now `fraction` visible.
    pub fn trigger(&mut self, target: &ElementId, fraction: f64) -> Vec<Fired> {
        self.registry
            .take_fired(|candidate| (candidate == target).then_some(fraction))
    }
}

impl VisibilityObserver for ManualObserver {
    fn observe(
        &mut self,
        target: ElementId,
        threshold: f64,
        handler: OneShot,
    ) -> Option<RegistrationId> {
        Some(self.registry.register(target, threshold, handler))
    }

    fn unobserve(&mut self, id: RegistrationId) -> bool {
        self.registry.remove(id)
    }

    fn pending(&self) -> usize {
        self.registry.registrations.len()
    }
}

impl fmt::Debug for ManualObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualObserver")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::dom::{Dom, Element};

    fn counting_handler(count: &Rc<Cell<u32>>) -> OneShot {
        let count = Rc::clone(count);
        Box::new(move |_, _| count.set(count.get() + 1))
    }

    #[test]
    fn visible_fraction_clips_to_viewport() {
        let viewport = Viewport {
            scroll_y: 0.0,
            width: 1000.0,
            height: 500.0,
        };
        assert_eq!(viewport.visible_fraction(Rect::new(0.0, 250.0)), 1.0);
        assert_eq!(viewport.visible_fraction(Rect::new(400.0, 200.0)), 0.5);
        assert_eq!(viewport.visible_fraction(Rect::new(600.0, 200.0)), 0.0);
        assert_eq!(viewport.visible_fraction(Rect::new(100.0, 0.0)), 1.0);
    }

    #[test]
    fn handler_fires_once_across_repeated_visibility() {
        let mut observer = ManualObserver::new();
        let count = Rc::new(Cell::new(0));
        let mut timeline = Timeline::default();
        let target = ElementId::from("about");

        observer.observe(target.clone(), 0.5, counting_handler(&count));
        for _ in 0..5 {
            dispatch_all(observer.trigger(&target, 1.0), &mut timeline);
            dispatch_all(observer.trigger(&target, 0.0), &mut timeline);
        }

        assert_eq!(count.get(), 1);
        assert_eq!(observer.pending(), 0);
    }

    #[test]
    fn below_threshold_keeps_waiting() {
        let mut observer = ManualObserver::new();
        let count = Rc::new(Cell::new(0));
        let target = ElementId::from("skills");
        observer.observe(target.clone(), 0.3, counting_handler(&count));

        assert!(observer.trigger(&target, 0.29).is_empty());
        assert_eq!(observer.pending(), 1);
        assert_eq!(observer.trigger(&target, 0.3).len(), 1);
    }

    #[test]
    fn viewport_observer_skips_targets_without_geometry() {
        let mut dom = Dom::new();
        dom.insert(Element::new("about", "section").with_rect(1000.0, 400.0));
        dom.insert(Element::new("floating", "div"));
        let mut observer = ViewportObserver::new(dom.into_shared());
        let count = Rc::new(Cell::new(0));

        assert!(observer
            .observe("floating".into(), 0.1, counting_handler(&count))
            .is_none());
        assert!(observer
            .observe("missing".into(), 0.1, counting_handler(&count))
            .is_none());
        assert!(observer
            .observe("about".into(), 0.5, counting_handler(&count))
            .is_some());
        assert_eq!(observer.pending(), 1);
    }

    #[test]
    fn viewport_observer_fires_when_scrolled_into_view() {
        let mut dom = Dom::new();
        dom.insert(Element::new("card-a", "div").with_rect(900.0, 100.0));
        dom.insert(Element::new("card-b", "div").with_rect(950.0, 100.0));
        let mut observer = ViewportObserver::new(dom.into_shared());
        let mut timeline = Timeline::default();
        let batches = Rc::new(std::cell::RefCell::new(Vec::new()));

        for id in ["card-a", "card-b"] {
            let batches = Rc::clone(&batches);
            observer.observe(
                id.into(),
                0.1,
                Box::new(move |entry, _| {
                    batches
                        .borrow_mut()
                        .push((entry.target.clone(), entry.batch_index))
                }),
            );
        }

        let mut viewport = Viewport {
            scroll_y: 0.0,
            width: 1000.0,
            height: 800.0,
        };
        assert!(observer.poll(viewport).is_empty());

        viewport.scroll_y = 300.0;
        assert_eq!(dispatch_all(observer.poll(viewport), &mut timeline), 2);
        assert_eq!(
            *batches.borrow(),
            vec![(ElementId::from("card-a"), 0), (ElementId::from("card-b"), 1)]
        );
        assert_eq!(observer.pending(), 0);
    }

    #[test]
    fn bottom_margin_delays_firing() {
        let mut dom = Dom::new();
        dom.insert(Element::new("card", "div").with_rect(760.0, 100.0));
        let dom = dom.into_shared();
        let mut plain = ViewportObserver::new(dom.clone());
        let mut inset = ViewportObserver::new(dom).with_bottom_margin(50.0);
        let count = Rc::new(Cell::new(0));
        plain.observe("card".into(), 0.1, counting_handler(&count));
        inset.observe("card".into(), 0.1, counting_handler(&count));

        let mut viewport = Viewport {
            scroll_y: 0.0,
            width: 1000.0,
            height: 800.0,
        };
        assert_eq!(plain.poll(viewport).len(), 1);
        assert!(inset.poll(viewport).is_empty());

        viewport.scroll_y = 15.0;
        assert!(inset.poll(viewport).is_empty());
        viewport.scroll_y = 30.0;
        assert_eq!(inset.poll(viewport).len(), 1);
    }

    #[test]
    fn unobserve_prevents_firing() {
        let mut observer = ManualObserver::new();
        let count = Rc::new(Cell::new(0));
        let target = ElementId::from("about");
        let id = observer
            .observe(target.clone(), 0.5, counting_handler(&count))
            .unwrap();

        assert!(observer.unobserve(id));
        assert!(observer.trigger(&target, 1.0).is_empty());
        assert_eq!(count.get(), 0);
    }
}
