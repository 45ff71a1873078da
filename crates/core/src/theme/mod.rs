//! Light/dark theme preference, the one value the page persists.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    dom::{ElementId, SharedDom},
    timeline::Timeline,
    PagePulseError, Result,
};

pub const THEME_KEY: &str = "theme";
pub const THEME_ATTRIBUTE: &str = "data-theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Icon offered to switch away from the current theme.
    pub fn icon_class(self) -> &'static str {
        match self {
            Theme::Light => "fas fa-moon",
            Theme::Dark => "fas fa-sun",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = PagePulseError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(PagePulseError::msg(format!("unknown theme `{other}`"))),
        }
    }
}

/// Key-value persistence for user preferences.
pub trait PreferenceStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences kept as a flat JSON object in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl PreferenceStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&values)?)?;
        Ok(())
    }
}

/// Applies the stored theme on start and flips it on demand.
pub struct ThemeToggle {
    dom: SharedDom,
    root: ElementId,
    button: ElementId,
    icon: ElementId,
    store: Box<dyn PreferenceStore>,
    transition: Duration,
    current: Theme,
    bound: bool,
}

impl ThemeToggle {
    pub fn new(
        dom: SharedDom,
        root: ElementId,
        button: ElementId,
        icon: ElementId,
        store: Box<dyn PreferenceStore>,
        transition: Duration,
    ) -> Self {
        Self {
            dom,
            root,
            button,
            icon,
            store,
            transition,
            current: Theme::default(),
            bound: false,
        }
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    /// Reads the saved preference (light when missing or unreadable) and
    /// applies it. A page without the toggle button or its icon gets no
    /// theme handling at all.
    pub fn init(&mut self) -> Theme {
        {
            let dom = self.dom.borrow();
            self.bound = dom.contains(&self.button) && dom.contains(&self.icon);
        }
        if !self.bound {
            tracing::debug!(button = %self.button, icon = %self.icon, "theme toggle absent");
            return self.current;
        }

        let saved = match self.store.load(THEME_KEY) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "could not read theme preference");
                None
            }
        };
        self.current = saved
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        self.apply();
        self.current
    }

    /// Switches theme, persists it and animates the change for the
    /// configured transition time.
    pub fn toggle(&mut self, timeline: &mut Timeline) -> Theme {
        if !self.bound {
            return self.current;
        }
        self.current = self.current.toggled();

        self.dom
            .borrow_mut()
            .set_style(&self.root, "transition", "all 0.3s ease");
        self.apply();
        if let Err(err) = self.store.store(THEME_KEY, self.current.as_str()) {
            tracing::warn!(error = %err, "could not persist theme preference");
        }

        let dom = self.dom.clone();
        let root = self.root.clone();
        timeline.schedule(self.transition, move |_| {
            dom.borrow_mut().remove_style(&root, "transition");
        });
        tracing::debug!(theme = %self.current, "theme toggled");
        self.current
    }

    fn apply(&self) {
        let mut dom = self.dom.borrow_mut();
        dom.set_attribute(&self.root, THEME_ATTRIBUTE, self.current.as_str());
        dom.set_attribute(&self.icon, "class", self.current.icon_class());
    }
}

impl fmt::Debug for ThemeToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeToggle")
            .field("root", &self.root)
            .field("button", &self.button)
            .field("icon", &self.icon)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, Element};

    fn page() -> SharedDom {
        let mut dom = Dom::new();
        dom.insert(Element::new("html", "html"));
        dom.insert(Element::new("themeToggle", "button"));
        dom.insert(Element::new("themeIcon", "i"));
        dom.into_shared()
    }

    fn toggle(dom: &SharedDom, store: Box<dyn PreferenceStore>) -> ThemeToggle {
        ThemeToggle::new(
            dom.clone(),
            "html".into(),
            "themeToggle".into(),
            "themeIcon".into(),
            store,
            Duration::from_millis(300),
        )
    }

    #[test]
    fn defaults_to_light_without_preference() {
        let dom = page();
        let mut theme = toggle(&dom, Box::new(MemoryStore::new()));

        assert_eq!(theme.init(), Theme::Light);
        assert_eq!(dom.borrow().attribute(&"html".into(), THEME_ATTRIBUTE), Some("light"));
        assert_eq!(dom.borrow().attribute(&"themeIcon".into(), "class"), Some("fas fa-moon"));
    }

    #[test]
    fn toggle_persists_and_clears_transition() {
        let dom = page();
        let mut theme = toggle(&dom, Box::new(MemoryStore::new()));
        let mut timeline = Timeline::default();
        theme.init();

        assert_eq!(theme.toggle(&mut timeline), Theme::Dark);
        assert_eq!(dom.borrow().style(&"html".into(), "transition"), Some("all 0.3s ease"));
        assert_eq!(dom.borrow().attribute(&"themeIcon".into(), "class"), Some("fas fa-sun"));

        timeline.advance(Duration::from_millis(300));
        assert_eq!(dom.borrow().style(&"html".into(), "transition"), None);
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("preferences.json");
        let dom = page();
        let mut timeline = Timeline::default();

        let mut first = toggle(&dom, Box::new(JsonFileStore::new(&path)));
        first.init();
        first.toggle(&mut timeline);

        let mut second = toggle(&dom, Box::new(JsonFileStore::new(&path)));
        assert_eq!(second.init(), Theme::Dark);
    }

    #[test]
    fn missing_toggle_leaves_page_untouched() {
        let mut dom = Dom::new();
        dom.insert(Element::new("html", "html"));
        dom.insert(Element::new("themeIcon", "i"));
        let dom = dom.into_shared();
        let mut store = MemoryStore::new();
        store.store(THEME_KEY, "dark").unwrap();
        let mut theme = toggle(&dom, Box::new(store));
        let mut timeline = Timeline::default();

        assert_eq!(theme.init(), Theme::Light);
        assert_eq!(theme.toggle(&mut timeline), Theme::Light);
        assert!(dom.borrow_mut().take_mutations().is_empty());
        assert_eq!(timeline.pending_timers(), 0);
    }

    #[test]
    fn unknown_saved_value_falls_back_to_light() {
        let dom = page();
        let mut store = MemoryStore::new();
        store.store(THEME_KEY, "sepia").unwrap();
        let mut theme = toggle(&dom, Box::new(store));

        assert_eq!(theme.init(), Theme::Light);
    }
}
