use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    path::Path,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::{visibility::Viewport, Result};

/// Handle to the document shared by every component of a session.
pub type SharedDom = Rc<RefCell<Dom>>;

/// Stable identifier of a page element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Vertical geometry of an element in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Option<Rect>,
}

fn default_tag() -> String {
    "div".to_string()
}

impl Element {
    pub fn new(id: impl Into<ElementId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            classes: BTreeSet::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            style: BTreeMap::new(),
            rect: None,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_rect(mut self, top: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(top, height));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// A single observable change applied to the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    ClassAdded { target: ElementId, class: String },
    ClassRemoved { target: ElementId, class: String },
    TextSet { target: ElementId, text: String },
    StyleSet { target: ElementId, property: String, value: Option<String> },
    AttributeSet { target: ElementId, name: String, value: String },
}

impl Mutation {
    pub fn target(&self) -> &ElementId {
        match self {
            Mutation::ClassAdded { target, .. }
            | Mutation::ClassRemoved { target, .. }
            | Mutation::TextSet { target, .. }
            | Mutation::StyleSet { target, .. }
            | Mutation::AttributeSet { target, .. } => target,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::ClassAdded { target, class } => write!(f, "#{target} +.{class}"),
            Mutation::ClassRemoved { target, class } => write!(f, "#{target} -.{class}"),
            Mutation::TextSet { target, text } => write!(f, "#{target} text={text:?}"),
            Mutation::StyleSet {
                target,
                property,
                value: Some(value),
            } => write!(f, "#{target} style.{property}={value:?}"),
            Mutation::StyleSet {
                target,
                property,
                value: None,
            } => write!(f, "#{target} style.{property} cleared"),
            Mutation::AttributeSet {
                target,
                name,
                value,
            } => write!(f, "#{target} [{name}={value:?}]"),
        }
    }
}

/// Serialized page description: initial viewport plus the element list in
/// document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl PageLayout {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn into_dom(self) -> Dom {
        let mut dom = Dom::new();
        for element in self.elements {
            dom.insert(element);
        }
        dom
    }
}

/// In-memory document.
///
/// Every component owns a disjoint set of elements; the document itself is
/// the only state they share. Mutations are recorded only when they change
/// something, so the log doubles as a minimal patch stream for a host.
#[derive(Debug)]
pub struct Dom {
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
    mutations: Vec<Mutation>,
    recording: bool,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::new(),
            mutations: Vec::new(),
            recording: true,
        }
    }

    pub fn into_shared(self) -> SharedDom {
        Rc::new(RefCell::new(self))
    }

    /// Inserts or replaces an element, keeping its document position when
    /// it already existed.
    pub fn insert(&mut self, element: Element) {
        match self.index.get(&element.id) {
            Some(&slot) => self.elements[slot] = element,
            None => {
                self.index.insert(element.id.clone(), self.elements.len());
                self.elements.push(element);
            }
        }
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.index.contains_key(id)
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.index.get(id).map(|&slot| &self.elements[slot])
    }

    fn element_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        let slot = *self.index.get(id)?;
        Some(&mut self.elements[slot])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Ids of all elements carrying `class`, in document order.
    pub fn elements_with_class(&self, class: &str) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|element| element.classes.contains(class))
            .map(|element| element.id.clone())
            .collect()
    }

    pub fn elements_with_tag(&self, tag: &str) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|element| element.tag == tag)
            .map(|element| element.id.clone())
            .collect()
    }

    /// Ids of all elements whose attribute `name` equals `value`.
    pub fn elements_with_attribute(&self, name: &str, value: &str) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|element| element.attributes.get(name).map(String::as_str) == Some(value))
            .map(|element| element.id.clone())
            .collect()
    }

    pub fn has_class(&self, id: &ElementId, class: &str) -> bool {
        self.element(id)
            .map(|element| element.classes.contains(class))
            .unwrap_or(false)
    }

    pub fn attribute(&self, id: &ElementId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    pub fn text(&self, id: &ElementId) -> Option<&str> {
        self.element(id).map(|element| element.text.as_str())
    }

    pub fn style(&self, id: &ElementId, property: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.style.get(property))
            .map(String::as_str)
    }

    pub fn rect(&self, id: &ElementId) -> Option<Rect> {
        self.element(id).and_then(|element| element.rect)
    }

    pub fn add_class(&mut self, id: &ElementId, class: &str) -> bool {
        let changed = self
            .element_mut(id)
            .map(|element| element.classes.insert(class.to_string()))
            .unwrap_or(false);
        if changed {
            self.record(Mutation::ClassAdded {
                target: id.clone(),
                class: class.to_string(),
            });
        }
        changed
    }

    pub fn remove_class(&mut self, id: &ElementId, class: &str) -> bool {
        let changed = self
            .element_mut(id)
            .map(|element| element.classes.remove(class))
            .unwrap_or(false);
        if changed {
            self.record(Mutation::ClassRemoved {
                target: id.clone(),
                class: class.to_string(),
            });
        }
        changed
    }

    /// Adds `class` when `on`, removes it otherwise.
    pub fn toggle_class(&mut self, id: &ElementId, class: &str, on: bool) -> bool {
        if on {
            self.add_class(id, class)
        } else {
            self.remove_class(id, class)
        }
    }

    pub fn set_text(&mut self, id: &ElementId, text: &str) -> bool {
        let changed = match self.element_mut(id) {
            Some(element) if element.text != text => {
                element.text = text.to_string();
                true
            }
            _ => false,
        };
        if changed {
            self.record(Mutation::TextSet {
                target: id.clone(),
                text: text.to_string(),
            });
        }
        changed
    }

    pub fn set_style(&mut self, id: &ElementId, property: &str, value: &str) -> bool {
        let changed = self
            .element_mut(id)
            .map(|element| {
                element.style.insert(property.to_string(), value.to_string())
                    != Some(value.to_string())
            })
            .unwrap_or(false);
        if changed {
            self.record(Mutation::StyleSet {
                target: id.clone(),
                property: property.to_string(),
                value: Some(value.to_string()),
            });
        }
        changed
    }

    pub fn remove_style(&mut self, id: &ElementId, property: &str) -> bool {
        let changed = self
            .element_mut(id)
            .map(|element| element.style.remove(property).is_some())
            .unwrap_or(false);
        if changed {
            self.record(Mutation::StyleSet {
                target: id.clone(),
                property: property.to_string(),
                value: None,
            });
        }
        changed
    }

    pub fn set_attribute(&mut self, id: &ElementId, name: &str, value: &str) -> bool {
        let changed = self
            .element_mut(id)
            .map(|element| {
                element.attributes.insert(name.to_string(), value.to_string())
                    != Some(value.to_string())
            })
            .unwrap_or(false);
        if changed {
            self.record(Mutation::AttributeSet {
                target: id.clone(),
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        changed
    }

    /// Turns the mutation log on or off. A host that never drains the log
    /// should switch it off.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
        if !recording {
            self.mutations.clear();
        }
    }

    /// Drains the mutations recorded since the previous call.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    fn record(&mut self, mutation: Mutation) {
        if self.recording {
            tracing::trace!(%mutation, "dom mutation");
            self.mutations.push(mutation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dom {
        let mut dom = Dom::new();
        dom.insert(Element::new("mainNav", "nav"));
        dom.insert(
            Element::new("link-about", "a")
                .with_class("nav-link")
                .with_attribute("href", "#about"),
        );
        dom.insert(Element::new("about", "section").with_rect(600.0, 400.0));
        dom
    }

    #[test]
    fn records_only_effective_changes() {
        let mut dom = sample();
        let nav = ElementId::from("mainNav");

        assert!(dom.add_class(&nav, "scrolled"));
        assert!(!dom.add_class(&nav, "scrolled"));
        assert!(dom.remove_class(&nav, "scrolled"));
        assert!(!dom.remove_class(&nav, "scrolled"));

        let mutations = dom.take_mutations();
        assert_eq!(mutations.len(), 2);
        assert!(dom.take_mutations().is_empty());
    }

    #[test]
    fn default_document_records_mutations() {
        let mut dom = Dom::default();
        dom.insert(Element::new("mainNav", "nav"));
        assert!(dom.add_class(&"mainNav".into(), "scrolled"));
        assert_eq!(dom.take_mutations().len(), 1);
    }

    #[test]
    fn absent_targets_are_silent() {
        let mut dom = sample();
        let ghost = ElementId::from("ghost");

        assert!(!dom.add_class(&ghost, "visible"));
        assert!(!dom.set_text(&ghost, "hello"));
        assert!(!dom.set_style(&ghost, "opacity", "1"));
        assert!(dom.take_mutations().is_empty());
    }

    #[test]
    fn queries_follow_document_order() {
        let mut dom = sample();
        dom.insert(Element::new("link-home", "a").with_class("nav-link"));

        let links = dom.elements_with_class("nav-link");
        assert_eq!(links, vec![ElementId::from("link-about"), ElementId::from("link-home")]);
        assert_eq!(dom.elements_with_tag("section"), vec![ElementId::from("about")]);
        assert_eq!(
            dom.elements_with_attribute("href", "#about"),
            vec![ElementId::from("link-about")]
        );
    }

    #[test]
    fn layout_json_builds_a_document() {
        let json = r#"{
            "viewport": {"scroll_y": 0.0, "width": 1280.0, "height": 720.0},
            "elements": [
                {"id": "home", "tag": "section", "rect": {"top": 0.0, "height": 700.0}},
                {"id": "counter", "classes": ["stat-number"], "attributes": {"data-count": "50"}}
            ]
        }"#;
        let layout: PageLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.viewport.height, 720.0);

        let dom = layout.into_dom();
        assert_eq!(dom.len(), 2);
        assert_eq!(dom.attribute(&"counter".into(), "data-count"), Some("50"));
        assert_eq!(dom.element(&"counter".into()).unwrap().tag, "div");
    }
}
