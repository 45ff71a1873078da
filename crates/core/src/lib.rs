//! Core library for PagePulse, the state-synchronization engine behind a
//! single-page portfolio site.
//!
//! The engine is host agnostic: it operates on an in-memory [`dom::Dom`],
//! runs on a deterministic [`timeline::Timeline`] and receives host input as
//! [`events::PageEvent`]s. Each module owns one component (rate limiting,
//! scroll classification, typing rotation, visibility-triggered animations)
//! and [`session::Session`] wires them together for one page lifetime.

pub mod config;
pub mod counter;
pub mod dom;
pub mod error;
pub mod events;
pub mod form;
pub mod loader;
pub mod rate_limit;
pub mod reveal;
pub mod scroll;
pub mod secret;
pub mod session;
pub mod theme;
pub mod timeline;
pub mod typing;
pub mod visibility;

pub use config::{AppConfig, ScrollConfig, TargetConfig, TimingConfig, TypingConfig, VisibilityConfig};
pub use counter::{CounterAnimator, CounterFrame, CounterRun};
pub use dom::{Dom, Element, ElementId, Mutation, PageLayout, Rect, SharedDom};
pub use error::{PagePulseError, Result};
pub use events::{load_script, EventBus, EventKind, PageEvent, ScriptedEvent};
pub use rate_limit::{Debounce, Throttle};
pub use reveal::RevealAnimator;
pub use scroll::{ScrollClassifier, ScrollSnapshot, SectionBounds};
pub use session::Session;
pub use theme::{JsonFileStore, MemoryStore, PreferenceStore, Theme};
pub use timeline::{Timeline, TimerId};
pub use typing::{RotationSequence, TypingAnimator, TypingPhase, TypingState};
pub use visibility::{ManualObserver, Viewport, ViewportObserver, VisibilityEntry, VisibilityObserver};
