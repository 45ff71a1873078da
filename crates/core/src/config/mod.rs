use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{PagePulseError, Result};

/// Top-level configuration structure for the engine.
///
/// Every section falls back to its defaults, so a config file only needs to
/// name the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub targets: TargetConfig,
}

impl AppConfig {
    /// Loads a configuration file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Self = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PagePulseError::msg(e.to_string()))
    }

    /// Rejects values that would stall the timeline or make visibility
    /// thresholds meaningless.
    pub fn validate(&self) -> Result<()> {
        let ticks = [
            ("timing.frame_interval_ms", self.timing.frame_interval_ms),
            ("typing.type_tick_ms", self.typing.type_tick_ms),
            ("typing.delete_tick_ms", self.typing.delete_tick_ms),
        ];
        for (name, value) in ticks {
            if value == 0 {
                return Err(PagePulseError::invalid_config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let thresholds = [
            ("visibility.counter_threshold", self.visibility.counter_threshold),
            ("visibility.skills_threshold", self.visibility.skills_threshold),
            ("visibility.card_threshold", self.visibility.card_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(PagePulseError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let pixels = [
            ("scroll.chrome_threshold_px", self.scroll.chrome_threshold_px),
            (
                "scroll.floating_control_threshold_px",
                self.scroll.floating_control_threshold_px,
            ),
            (
                "visibility.card_bottom_margin_px",
                self.visibility.card_bottom_margin_px,
            ),
        ];
        for (name, value) in pixels {
            if !value.is_finite() || value < 0.0 {
                return Err(PagePulseError::invalid_config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.timing.reveal_stagger_ms > MAX_REVEAL_STAGGER_MS {
            return Err(PagePulseError::invalid_config(format!(
                "timing.reveal_stagger_ms must be at most {MAX_REVEAL_STAGGER_MS}, got {}",
                self.timing.reveal_stagger_ms
            )));
        }

        Ok(())
    }
}

/// Upper bound for the per-element reveal delay.
pub const MAX_REVEAL_STAGGER_MS: u64 = 10_000;

/// Rate limiting, frame and animation timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub scroll_throttle_ms: u64,
    pub resize_debounce_ms: u64,
    pub frame_interval_ms: u64,
    pub counter_duration_ms: u64,
    pub reveal_stagger_ms: u64,
    pub loader_fade_ms: u64,
    pub theme_transition_ms: u64,
    pub form_submit_ms: u64,
    pub form_message_ms: u64,
    pub secret_spin_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scroll_throttle_ms: 100,
            resize_debounce_ms: 250,
            frame_interval_ms: 16,
            counter_duration_ms: 2000,
            reveal_stagger_ms: 100,
            loader_fade_ms: 500,
            theme_transition_ms: 300,
            form_submit_ms: 2000,
            form_message_ms: 5000,
            secret_spin_ms: 2000,
        }
    }
}

impl TimingConfig {
    pub fn scroll_throttle(&self) -> Duration {
        Duration::from_millis(self.scroll_throttle_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn counter_duration(&self) -> Duration {
        Duration::from_millis(self.counter_duration_ms)
    }

    pub fn reveal_stagger(&self) -> Duration {
        Duration::from_millis(self.reveal_stagger_ms)
    }
}

/// Scroll classification thresholds. The chrome and floating-control
/// thresholds are independent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Offset past which the navigation chrome is compacted.
    pub chrome_threshold_px: f64,
    /// Offset past which the back-to-top control is shown.
    pub floating_control_threshold_px: f64,
    /// Sections become active this many pixels before their top edge.
    pub section_activation_offset_px: f64,
    /// Anchor navigation lands this many pixels above the section.
    pub anchor_offset_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            chrome_threshold_px: 100.0,
            floating_control_threshold_px: 500.0,
            section_activation_offset_px: 100.0,
            anchor_offset_px: 80.0,
        }
    }
}

/// Rotation sequence and cadence of the typed-text animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    pub roles: Vec<String>,
    pub type_tick_ms: u64,
    pub delete_tick_ms: u64,
    pub full_pause_ms: u64,
    pub empty_pause_ms: u64,
    pub start_delay_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            roles: vec![
                "Full Stack Developer".to_string(),
                "AI/ML Enthusiast".to_string(),
                "Problem Solver".to_string(),
                "Tech Explorer".to_string(),
            ],
            type_tick_ms: 100,
            delete_tick_ms: 50,
            full_pause_ms: 2000,
            empty_pause_ms: 500,
            start_delay_ms: 1000,
        }
    }
}

/// Visible fraction required before each one-shot animation fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub counter_threshold: f64,
    pub skills_threshold: f64,
    pub card_threshold: f64,
    /// Cards count as visible only once they are this far above the
    /// viewport's bottom edge.
    pub card_bottom_margin_px: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            counter_threshold: 0.5,
            skills_threshold: 0.3,
            card_threshold: 0.1,
            card_bottom_margin_px: 50.0,
        }
    }
}

/// Element ids and class names the engine binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub root: String,
    pub body: String,
    pub navbar: String,
    pub typing: String,
    pub scroll_to_top: String,
    pub loader: String,
    pub theme_toggle: String,
    pub theme_icon: String,
    pub skills_section: String,
    pub about_section: String,
    pub contact_form: String,
    pub form_message: String,
    pub section_tag: String,
    pub nav_link_class: String,
    pub navbar_collapse_class: String,
    pub counter_class: String,
    pub counter_attribute: String,
    pub skill_class: String,
    pub project_card_class: String,
    pub scroll_indicator_class: String,
    pub submit_button_class: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            root: "html".to_string(),
            body: "body".to_string(),
            navbar: "mainNav".to_string(),
            typing: "typingRole".to_string(),
            scroll_to_top: "scrollToTop".to_string(),
            loader: "loader".to_string(),
            theme_toggle: "themeToggle".to_string(),
            theme_icon: "themeIcon".to_string(),
            skills_section: "skills".to_string(),
            about_section: "about".to_string(),
            contact_form: "contactForm".to_string(),
            form_message: "form-message".to_string(),
            section_tag: "section".to_string(),
            nav_link_class: "nav-link".to_string(),
            navbar_collapse_class: "navbar-collapse".to_string(),
            counter_class: "stat-number".to_string(),
            counter_attribute: "data-count".to_string(),
            skill_class: "skill-brand".to_string(),
            project_card_class: "project-card".to_string(),
            scroll_indicator_class: "scroll-indicator".to_string(),
            submit_button_class: "btn-submit".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_page_timing() {
        let config = AppConfig::default();
        assert_eq!(config.timing.scroll_throttle(), Duration::from_millis(100));
        assert_eq!(config.timing.resize_debounce(), Duration::from_millis(250));
        assert_eq!(config.typing.type_tick_ms, 100);
        assert_eq!(config.typing.delete_tick_ms, 50);
        assert_eq!(config.scroll.chrome_threshold_px, 100.0);
        assert_eq!(config.scroll.floating_control_threshold_px, 500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[scroll]\nfloating_control_threshold_px = 800.0\n\n[typing]\nroles = [\"A\", \"BB\"]"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.scroll.floating_control_threshold_px, 800.0);
        assert_eq!(config.scroll.chrome_threshold_px, 100.0);
        assert_eq!(config.typing.roles, vec!["A", "BB"]);
        assert_eq!(config.typing.full_pause_ms, 2000);
    }

    #[test]
    fn json_files_are_detected_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"timing": {{"scroll_throttle_ms": 50}}}}"#).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.timing.scroll_throttle_ms, 50);
        assert_eq!(config.timing.resize_debounce_ms, 250);
    }

    #[test]
    fn rejects_zero_tick_and_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.typing.delete_tick_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("typing.delete_tick_ms"));

        let mut config = AppConfig::default();
        config.visibility.counter_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(PagePulseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_oversized_stagger_and_negative_margin() {
        let mut config = AppConfig::default();
        config.timing.reveal_stagger_ms = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("timing.reveal_stagger_ms"));

        let mut config = AppConfig::default();
        config.visibility.card_bottom_margin_px = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
