//! Scroll-position classification.
//!
//! Each tick reduces the current offset and the static section layout to a
//! [`ScrollSnapshot`], then reconciles the navigation chrome, the floating
//! back-to-top control and the active navigation link with it.

use serde::{Deserialize, Serialize};

use crate::{
    config::{ScrollConfig, TargetConfig},
    dom::{Dom, ElementId, SharedDom},
};

pub const SCROLLED_CLASS: &str = "scrolled";
pub const VISIBLE_CLASS: &str = "visible";
pub const ACTIVE_CLASS: &str = "active";

/// Static layout of one content section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBounds {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

impl SectionBounds {
    pub fn new(id: impl Into<String>, top: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            top,
            height,
        }
    }
}

/// Derived view of a scroll offset. Never stored beyond the current tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollSnapshot {
    pub past_threshold: bool,
    pub active_section_id: Option<String>,
    pub floating_control_visible: bool,
}

/// Section whose activation window `[top - offset, top - offset + height)`
/// contains `scroll_y`. When windows overlap the last section in document
/// order wins.
pub fn active_section<'a>(
    sections: &'a [SectionBounds],
    scroll_y: f64,
    activation_offset: f64,
) -> Option<&'a SectionBounds> {
    sections.iter().rev().find(|section| {
        let start = section.top - activation_offset;
        scroll_y >= start && scroll_y < start + section.height
    })
}

/// Classifies `scroll_y`. When no section matches, `previous` is carried
/// over so the highlight does not flicker at the top or bottom of the page.
pub fn classify(
    config: &ScrollConfig,
    sections: &[SectionBounds],
    scroll_y: f64,
    previous: Option<&str>,
) -> ScrollSnapshot {
    let active_section_id = active_section(sections, scroll_y, config.section_activation_offset_px)
        .map(|section| section.id.clone())
        .or_else(|| previous.map(str::to_string));

    ScrollSnapshot {
        past_threshold: scroll_y > config.chrome_threshold_px,
        active_section_id,
        floating_control_visible: scroll_y > config.floating_control_threshold_px,
    }
}

/// Offset that anchor navigation scrolls to for a section starting at `top`.
pub fn anchor_target(config: &ScrollConfig, top: f64) -> f64 {
    (top - config.anchor_offset_px).max(0.0)
}

/// Reads section bounds from every element with `tag` that has geometry.
pub fn sections_from_dom(dom: &Dom, tag: &str) -> Vec<SectionBounds> {
    dom.elements_with_tag(tag)
        .into_iter()
        .filter_map(|id| {
            let rect = dom.rect(&id)?;
            Some(SectionBounds::new(id.as_str(), rect.top, rect.height))
        })
        .collect()
}

#[derive(Debug)]
pub struct ScrollClassifier {
    dom: SharedDom,
    config: ScrollConfig,
    sections: Vec<SectionBounds>,
    navbar: ElementId,
    floating_control: ElementId,
    nav_links: Vec<(ElementId, Option<String>)>,
    snapshot: Option<ScrollSnapshot>,
    updates: u64,
}

impl ScrollClassifier {
    pub fn new(
        dom: SharedDom,
        config: ScrollConfig,
        sections: Vec<SectionBounds>,
        targets: &TargetConfig,
    ) -> Self {
        let nav_links = {
            let dom = dom.borrow();
            dom.elements_with_class(&targets.nav_link_class)
                .into_iter()
                .map(|link| {
                    let section = dom
                        .attribute(&link, "href")
                        .and_then(|href| href.strip_prefix('#'))
                        .map(str::to_string);
                    (link, section)
                })
                .collect()
        };

        Self {
            dom,
            config,
            sections,
            navbar: ElementId::new(targets.navbar.as_str()),
            floating_control: ElementId::new(targets.scroll_to_top.as_str()),
            nav_links,
            snapshot: None,
            updates: 0,
        }
    }

    pub fn sections(&self) -> &[SectionBounds] {
        &self.sections
    }

    pub fn snapshot(&self) -> Option<&ScrollSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn active_section(&self) -> Option<&str> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.active_section_id.as_deref())
    }

    /// Number of classification passes performed.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Section top for anchor navigation to `id`.
    pub fn section_top(&self, id: &str) -> Option<f64> {
        self.sections
            .iter()
            .find(|section| section.id == id)
            .map(|section| section.top)
    }

    /// Classifies `scroll_y` and applies the result to the document.
    pub fn update(&mut self, scroll_y: f64) -> &ScrollSnapshot {
        let snapshot = classify(
            &self.config,
            &self.sections,
            scroll_y,
            self.active_section(),
        );
        self.apply(&snapshot);
        self.updates += 1;
        self.snapshot.insert(snapshot)
    }

    fn apply(&self, snapshot: &ScrollSnapshot) {
        let mut dom = self.dom.borrow_mut();
        dom.toggle_class(&self.navbar, SCROLLED_CLASS, snapshot.past_threshold);
        dom.toggle_class(
            &self.floating_control,
            VISIBLE_CLASS,
            snapshot.floating_control_visible,
        );

        let Some(active) = snapshot.active_section_id.as_deref() else {
            return;
        };
        for (link, section) in &self.nav_links {
            dom.toggle_class(link, ACTIVE_CLASS, section.as_deref() == Some(active));
        }
    }
}
