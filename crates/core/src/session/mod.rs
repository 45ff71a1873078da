//! Page session: owns the clock, the event sources and every component, and
//! wires them together on start.
//!
//! Components never talk to each other. They share the document and, where
//! a host-level value is involved (viewport, loading flag), a session-scoped
//! cell created in [`Session::start_with`] and reset in
//! [`Session::teardown`].

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    time::Duration,
};

use crate::{
    config::AppConfig,
    counter::CounterAnimator,
    dom::{Dom, ElementId, Mutation, PageLayout, SharedDom},
    events::{EventBus, EventKind, PageEvent, ScriptedEvent},
    form::ContactForm,
    loader::Loader,
    rate_limit::{Debounce, Throttle},
    reveal::RevealAnimator,
    scroll::{anchor_target, sections_from_dom, ScrollClassifier, ScrollSnapshot},
    secret::{KeySequenceDetector, SpinEffect},
    theme::{MemoryStore, PreferenceStore, Theme, ThemeToggle},
    timeline::Timeline,
    typing::{TypingAnimator, TypingState},
    visibility::{dispatch_all, Viewport, ViewportObserver, VisibilityObserver},
    Result,
};

/// Class marking the expanded mobile navigation menu.
pub const MENU_OPEN_CLASS: &str = "show";

/// Observers grouped so that a batch index only counts registrations of
/// the same group.
type ObserverGroups = Rc<Vec<RefCell<ViewportObserver>>>;

pub struct Session {
    config: AppConfig,
    dom: SharedDom,
    timeline: Timeline,
    bus: EventBus,
    viewport: Rc<Cell<Viewport>>,
    observers: ObserverGroups,
    loading: Rc<Cell<bool>>,
    pending_scroll: Rc<Cell<Option<f64>>>,
    scroll: Rc<RefCell<ScrollClassifier>>,
    theme: Rc<RefCell<ThemeToggle>>,
    typing: Option<Rc<RefCell<TypingAnimator>>>,
}

impl Session {
    /// Starts a session with the default viewport and an in-memory
    /// preference store.
    pub fn start(dom: Dom, config: AppConfig) -> Result<Self> {
        Self::start_with(dom, Viewport::default(), config, Box::new(MemoryStore::new()))
    }

    pub fn from_layout(layout: PageLayout, config: AppConfig) -> Result<Self> {
        let viewport = layout.viewport;
        Self::start_with(layout.into_dom(), viewport, config, Box::new(MemoryStore::new()))
    }

    /// Validates `config`, initialises every component against `dom` and
    /// subscribes them to their event sources. Registrations already visible
    /// in `viewport` fire immediately.
    pub fn start_with(
        dom: Dom,
        viewport: Viewport,
        config: AppConfig,
        store: Box<dyn PreferenceStore>,
    ) -> Result<Self> {
        config.validate()?;

        let dom = dom.into_shared();
        let targets = &config.targets;
        let timing = &config.timing;
        let mut timeline = Timeline::new(timing.frame_interval());

        let mut theme = ThemeToggle::new(
            dom.clone(),
            ElementId::new(targets.root.as_str()),
            ElementId::new(targets.theme_toggle.as_str()),
            ElementId::new(targets.theme_icon.as_str()),
            store,
            Duration::from_millis(timing.theme_transition_ms),
        );
        theme.init();

        let sections = sections_from_dom(&dom.borrow(), &targets.section_tag);
        let scroll = ScrollClassifier::new(dom.clone(), config.scroll.clone(), sections, targets);

        let typing = TypingAnimator::from_config(
            dom.clone(),
            ElementId::new(targets.typing.as_str()),
            &config.typing,
        )
        .and_then(|animator| animator.spawn(&mut timeline));

        let reveal = RevealAnimator::new(dom.clone(), timing.reveal_stagger());
        let mut sections_observer = ViewportObserver::new(dom.clone());
        reveal.clone().attach_group(
            &mut sections_observer,
            ElementId::new(targets.skills_section.as_str()),
            config.visibility.skills_threshold,
            targets.skill_class.clone(),
        );
        CounterAnimator::new(
            dom.clone(),
            targets.counter_class.as_str(),
            targets.counter_attribute.as_str(),
            timing.counter_duration(),
            timing.frame_interval(),
        )
        .attach(
            &mut sections_observer,
            ElementId::new(targets.about_section.as_str()),
            config.visibility.counter_threshold,
        );

        let mut cards_observer = ViewportObserver::new(dom.clone())
            .with_bottom_margin(config.visibility.card_bottom_margin_px);
        let cards = dom.borrow().elements_with_class(&targets.project_card_class);
        reveal.attach_each(&mut cards_observer, &cards, config.visibility.card_threshold);
        let observers = Rc::new(vec![
            RefCell::new(sections_observer),
            RefCell::new(cards_observer),
        ]);

        let mut session = Self {
            dom,
            timeline,
            bus: EventBus::new(),
            viewport: Rc::new(Cell::new(viewport)),
            observers,
            loading: Rc::new(Cell::new(true)),
            pending_scroll: Rc::new(Cell::new(None)),
            scroll: Rc::new(RefCell::new(scroll)),
            theme: Rc::new(RefCell::new(theme)),
            typing,
            config,
        };
        session.subscribe_all();

        let fired = poll_visibility(&session.observers, viewport, &mut session.timeline);
        tracing::info!(
            sections = session.scroll.borrow().sections().len(),
            typing = session.typing.is_some(),
            watching = session.pending_visibility(),
            fired,
            "session started"
        );
        Ok(session)
    }

    fn subscribe_all(&mut self) {
        self.subscribe_load();
        self.subscribe_scroll();
        self.subscribe_resize();
        self.subscribe_clicks();
        self.subscribe_form();
        self.subscribe_keys();
    }

    fn subscribe_load(&mut self) {
        let loader = Loader::new(
            self.dom.clone(),
            ElementId::new(self.config.targets.loader.as_str()),
            Duration::from_millis(self.config.timing.loader_fade_ms),
            Rc::clone(&self.loading),
        );
        let scroll = Rc::clone(&self.scroll);
        let observers = Rc::clone(&self.observers);
        let viewport = Rc::clone(&self.viewport);

        self.bus.subscribe(EventKind::Load, move |_, timeline| {
            loader.hide(timeline);
            scroll.borrow_mut().update(viewport.get().scroll_y);
            poll_visibility(&observers, viewport.get(), timeline);
        });
    }

    /// Classification runs throttled, with a trailing update once scrolling
    /// settles so the last offset of a burst is never lost. Visibility is
    /// polled on every scroll event.
    fn subscribe_scroll(&mut self) {
        let interval = self.config.timing.scroll_throttle();

        let classifier = Rc::clone(&self.scroll);
        let mut throttle = Throttle::new(interval, move |offset: f64| {
            classifier.borrow_mut().update(offset);
        });
        let classifier = Rc::clone(&self.scroll);
        let settle = Debounce::new(interval, move |offset: f64, _: &mut Timeline| {
            classifier.borrow_mut().update(offset);
        });
        let observers = Rc::clone(&self.observers);
        let viewport = Rc::clone(&self.viewport);

        self.bus.subscribe(EventKind::Scroll, move |_, timeline| {
            let current = viewport.get();
            if !throttle.call(timeline.now(), current.scroll_y) {
                tracing::trace!(offset = current.scroll_y, "scroll classification throttled");
            }
            settle.call(timeline, current.scroll_y);
            poll_visibility(&observers, current, timeline);
        });
    }

    fn subscribe_resize(&mut self) {
        let observers = Rc::clone(&self.observers);
        let viewport = Rc::clone(&self.viewport);
        let refresh = Debounce::new(
            self.config.timing.resize_debounce(),
            move |_: (), timeline: &mut Timeline| {
                let fired = poll_visibility(&observers, viewport.get(), timeline);
                tracing::debug!(fired, "visibility refreshed after resize");
            },
        );

        self.bus.subscribe(EventKind::Resize, move |_, timeline| {
            refresh.call(timeline, ());
        });
    }

    fn subscribe_clicks(&mut self) {
        let targets = &self.config.targets;
        let theme_toggle = ElementId::new(targets.theme_toggle.as_str());
        let scroll_to_top = ElementId::new(targets.scroll_to_top.as_str());
        let about = ElementId::new(targets.about_section.as_str());
        let indicator_class = targets.scroll_indicator_class.clone();
        let nav_link_class = targets.nav_link_class.clone();
        let collapse_class = targets.navbar_collapse_class.clone();
        let scroll_config = self.config.scroll.clone();
        let dom = self.dom.clone();
        let theme = Rc::clone(&self.theme);
        let pending_scroll = Rc::clone(&self.pending_scroll);

        self.bus.subscribe(EventKind::Click, move |event, timeline| {
            let PageEvent::Click { target } = event else {
                return;
            };
            if *target == theme_toggle {
                theme.borrow_mut().toggle(timeline);
                return;
            }
            if *target == scroll_to_top {
                pending_scroll.set(Some(0.0));
                return;
            }

            let mut dom = dom.borrow_mut();
            if dom.has_class(target, &nav_link_class) {
                for menu in dom.elements_with_class(&collapse_class) {
                    if dom.remove_class(&menu, MENU_OPEN_CLASS) {
                        tracing::debug!(element = %menu, "mobile menu closed");
                    }
                }
            }
            let destination = if dom.has_class(target, &indicator_class) {
                Some(about.clone())
            } else {
                dom.attribute(target, "href")
                    .and_then(|href| href.strip_prefix('#'))
                    .filter(|id| !id.is_empty())
                    .map(ElementId::new)
            };
            let Some(section) = destination else {
                return;
            };
            match dom.rect(&section) {
                Some(rect) => pending_scroll.set(Some(anchor_target(&scroll_config, rect.top))),
                None => tracing::debug!(element = %section, "anchor target absent"),
            }
        });
    }

    fn subscribe_form(&mut self) {
        let targets = &self.config.targets;
        let timing = &self.config.timing;
        let form = Rc::new(ContactForm::new(
            self.dom.clone(),
            ElementId::new(targets.contact_form.as_str()),
            ElementId::new(targets.form_message.as_str()),
            targets.submit_button_class.as_str(),
            Duration::from_millis(timing.form_submit_ms),
            Duration::from_millis(timing.form_message_ms),
        ));

        let input_form = Rc::clone(&form);
        self.bus.subscribe(EventKind::Input, move |event, _| {
            if let PageEvent::Input { target, value } = event {
                if input_form.owns(target) {
                    input_form.input(target, value);
                }
            }
        });

        let blur_form = Rc::clone(&form);
        self.bus.subscribe(EventKind::Blur, move |event, _| {
            if let PageEvent::Blur { target } = event {
                if blur_form.owns(target) {
                    blur_form.validate_field(target);
                }
            }
        });

        let dom = self.dom.clone();
        self.bus.subscribe(EventKind::Submit, move |event, timeline| {
            let PageEvent::Submit { target } = event else {
                return;
            };
            if target != form.form() || !dom.borrow().contains(target) {
                return;
            }
            let accepted = form.submit(timeline);
            tracing::debug!(accepted, "contact form submitted");
        });
    }

    fn subscribe_keys(&mut self) {
        let mut detector = KeySequenceDetector::konami();
        let spin = SpinEffect::new(
            self.dom.clone(),
            ElementId::new(self.config.targets.body.as_str()),
            Duration::from_millis(self.config.timing.secret_spin_ms),
        );

        self.bus.subscribe(EventKind::KeyDown, move |event, timeline| {
            if let &PageEvent::KeyDown { code } = event {
                if detector.push(code) {
                    spin.play(timeline);
                }
            }
        });
    }

    /// Feeds one host event through the session. Scroll and resize events
    /// update the viewport before any handler runs. Returns the number of
    /// handlers that ran, including those of a scroll requested by anchor
    /// navigation.
    pub fn dispatch(&mut self, event: PageEvent) -> usize {
        let mut viewport = self.viewport.get();
        match &event {
            PageEvent::Scroll { offset } => viewport.scroll_y = offset.max(0.0),
            PageEvent::Resize { width, height } => {
                viewport.width = width.max(0.0);
                viewport.height = height.max(0.0);
            }
            _ => {}
        }
        self.viewport.set(viewport);

        let handled = self.bus.emit(&event, &mut self.timeline);
        match self.pending_scroll.take() {
            Some(offset) => handled + self.dispatch(PageEvent::Scroll { offset }),
            None => handled,
        }
    }

    /// Plays `script` in order, advancing the clock to each event's time
    /// before dispatching it. Events in the past are dispatched immediately.
    pub fn replay(&mut self, script: &[ScriptedEvent]) -> usize {
        self.replay_with(script, |_| {})
    }

    /// Like [`Session::replay`], calling `observe` once the clock reaches
    /// each step and again after the step's event was dispatched.
    pub fn replay_with<F>(&mut self, script: &[ScriptedEvent], mut observe: F) -> usize
    where
        F: FnMut(&mut Session),
    {
        let mut handled = 0;
        for step in script {
            self.timeline.advance_to(Duration::from_millis(step.at_ms));
            observe(self);
            handled += self.dispatch(step.event.clone());
            observe(self);
        }
        handled
    }

    pub fn advance(&mut self, by: Duration) -> usize {
        self.timeline.advance(by)
    }

    pub fn advance_to(&mut self, at: Duration) -> usize {
        self.timeline.advance_to(at)
    }

    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    /// Whether the page loader is still showing.
    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        self.dom.borrow_mut().take_mutations()
    }

    pub fn dom(&self) -> &SharedDom {
        &self.dom
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn theme(&self) -> Theme {
        self.theme.borrow().current()
    }

    pub fn scroll_snapshot(&self) -> Option<ScrollSnapshot> {
        self.scroll.borrow().snapshot().cloned()
    }

    pub fn typing_state(&self) -> Option<TypingState> {
        self.typing.as_ref().map(|animator| animator.borrow().state())
    }

    /// Visibility registrations that have not fired yet.
    pub fn pending_visibility(&self) -> usize {
        self.observers
            .iter()
            .map(|observer| observer.borrow().pending())
            .sum()
    }

    /// Stops every component and returns session-scoped state to its
    /// initial values. The document keeps its current content.
    pub fn teardown(&mut self) {
        self.bus.clear();
        self.timeline.clear();
        self.typing = None;
        for observer in self.observers.iter() {
            *observer.borrow_mut() = ViewportObserver::new(self.dom.clone());
        }
        self.pending_scroll.set(None);
        self.loading.set(true);
        tracing::debug!("session torn down");
    }
}

fn poll_visibility(observers: &ObserverGroups, viewport: Viewport, timeline: &mut Timeline) -> usize {
    let mut total = 0;
    for observer in observers.iter() {
        let fired = observer.borrow_mut().poll(viewport);
        total += dispatch_all(fired, timeline);
    }
    total
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("now", &self.timeline.now())
            .field("viewport", &self.viewport.get())
            .field("loading", &self.loading.get())
            .field("bus", &self.bus)
            .finish()
    }
}
