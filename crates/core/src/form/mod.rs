use std::{sync::OnceLock, time::Duration};

use regex::Regex;

use crate::{
    dom::{ElementId, SharedDom},
    rate_limit::Debounce,
    timeline::Timeline,
};

pub const VALID_CLASS: &str = "is-valid";
pub const INVALID_CLASS: &str = "is-invalid";
pub const LOADING_CLASS: &str = "loading";

pub const ERROR_MESSAGE: &str = "Please fill in all required fields correctly.";
pub const SUCCESS_MESSAGE: &str = "Thank you for your message! I'll get back to you soon.";

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// Checks a single field value. Values are trimmed first; an empty optional
/// field is valid.
pub fn validate_value(value: &str, required: bool, email: bool) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return !required;
    }
    !email || email_pattern().is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

impl MessageKind {
    fn class(self) -> &'static str {
        match self {
            MessageKind::Success => "success",
            MessageKind::Error => "error",
        }
    }
}

/// Contact form bound to the fields whose `form` attribute names it.
pub struct ContactForm {
    dom: SharedDom,
    form: ElementId,
    message: ElementId,
    submit_button_class: String,
    submit_delay: Duration,
    hide_message: Debounce<()>,
}

impl ContactForm {
    pub fn new(
        dom: SharedDom,
        form: ElementId,
        message: ElementId,
        submit_button_class: impl Into<String>,
        submit_delay: Duration,
        message_duration: Duration,
    ) -> Self {
        let hide_dom = dom.clone();
        let hide_target = message.clone();
        let hide_message = Debounce::new(message_duration, move |_: (), _: &mut Timeline| {
            hide_dom
                .borrow_mut()
                .set_style(&hide_target, "display", "none");
        });

        Self {
            dom,
            form,
            message,
            submit_button_class: submit_button_class.into(),
            submit_delay,
            hide_message,
        }
    }

    pub fn form(&self) -> &ElementId {
        &self.form
    }

    /// Input fields of this form in document order.
    pub fn fields(&self) -> Vec<ElementId> {
        let dom = self.dom.borrow();
        dom.elements_with_attribute("form", self.form.as_str())
            .into_iter()
            .filter(|id| {
                dom.element(id)
                    .map(|element| matches!(element.tag.as_str(), "input" | "textarea"))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn owns(&self, field: &ElementId) -> bool {
        self.dom.borrow().attribute(field, "form") == Some(self.form.as_str())
    }

    /// Validates one field and marks it valid or invalid.
    pub fn validate_field(&self, field: &ElementId) -> bool {
        let mut dom = self.dom.borrow_mut();
        let Some(element) = dom.element(field) else {
            return false;
        };
        let value = element.attributes.get("value").cloned().unwrap_or_default();
        let required = element.attributes.contains_key("required");
        let email = element.attributes.get("type").map(String::as_str) == Some("email");
        let valid = validate_value(&value, required, email);

        dom.remove_class(field, VALID_CLASS);
        dom.remove_class(field, INVALID_CLASS);
        dom.add_class(field, if valid { VALID_CLASS } else { INVALID_CLASS });
        valid
    }

    /// Stores new input and clears any validation marker.
    pub fn input(&self, field: &ElementId, value: &str) {
        let mut dom = self.dom.borrow_mut();
        dom.set_attribute(field, "value", value);
        dom.remove_class(field, VALID_CLASS);
        dom.remove_class(field, INVALID_CLASS);
    }

    /// Validates every required field and, when all pass, simulates the
    /// submission. Returns whether the form was accepted.
    pub fn submit(&self, timeline: &mut Timeline) -> bool {
        let required: Vec<ElementId> = {
            let dom = self.dom.borrow();
            self.fields()
                .into_iter()
                .filter(|id| dom.attribute(id, "required").is_some())
                .collect()
        };
        let mut valid = true;
        for field in &required {
            valid &= self.validate_field(field);
        }

        if !valid {
            self.show_message(ERROR_MESSAGE, MessageKind::Error, timeline);
            return false;
        }

        let button = self.submit_button();
        if let Some(button) = &button {
            self.dom.borrow_mut().add_class(button, LOADING_CLASS);
        }

        let dom = self.dom.clone();
        let fields = self.fields();
        let message = self.message.clone();
        let hide = self.hide_message.clone();
        timeline.schedule(self.submit_delay, move |timeline| {
            {
                let mut dom = dom.borrow_mut();
                if let Some(button) = &button {
                    dom.remove_class(button, LOADING_CLASS);
                }
                for field in &fields {
                    dom.set_attribute(field, "value", "");
                    dom.remove_class(field, VALID_CLASS);
                    dom.remove_class(field, INVALID_CLASS);
                }
            }
            write_message(&dom, &message, SUCCESS_MESSAGE, MessageKind::Success);
            hide.call(timeline, ());
        });
        true
    }

    pub fn show_message(&self, text: &str, kind: MessageKind, timeline: &mut Timeline) {
        if write_message(&self.dom, &self.message, text, kind) {
            self.hide_message.call(timeline, ());
        }
    }

    fn submit_button(&self) -> Option<ElementId> {
        let dom = self.dom.borrow();
        dom.elements_with_class(&self.submit_button_class)
            .into_iter()
            .find(|id| dom.attribute(id, "form") == Some(self.form.as_str()))
    }
}

fn write_message(dom: &SharedDom, message: &ElementId, text: &str, kind: MessageKind) -> bool {
    let mut dom = dom.borrow_mut();
    if !dom.contains(message) {
        return false;
    }
    dom.set_text(message, text);
    dom.set_attribute(message, "class", &format!("form-message {}", kind.class()));
    dom.set_style(message, "display", "block");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, Element};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn page() -> SharedDom {
        let mut dom = Dom::new();
        dom.insert(Element::new("contactForm", "form"));
        dom.insert(Element::new("form-message", "div"));
        dom.insert(
            Element::new("name", "input")
                .with_attribute("form", "contactForm")
                .with_attribute("required", ""),
        );
        dom.insert(
            Element::new("email", "input")
                .with_attribute("form", "contactForm")
                .with_attribute("type", "email")
                .with_attribute("required", ""),
        );
        dom.insert(Element::new("note", "textarea").with_attribute("form", "contactForm"));
        dom.insert(
            Element::new("send", "button")
                .with_class("btn-submit")
                .with_attribute("form", "contactForm"),
        );
        dom.into_shared()
    }

    fn form(dom: &SharedDom) -> ContactForm {
        ContactForm::new(
            dom.clone(),
            "contactForm".into(),
            "form-message".into(),
            "btn-submit",
            ms(2000),
            ms(5000),
        )
    }

    #[test]
    fn value_rules() {
        assert!(!validate_value("   ", true, false));
        assert!(validate_value("", false, true));
        assert!(validate_value(" a@b.co ", true, true));
        assert!(!validate_value("a@b", true, true));
        assert!(!validate_value("a b@c.d", true, true));
    }

    #[test]
    fn blur_marks_field_and_input_clears_it() {
        let dom = page();
        let form = form(&dom);
        let email = ElementId::from("email");

        form.input(&email, "nope");
        assert!(!form.validate_field(&email));
        assert!(dom.borrow().has_class(&email, INVALID_CLASS));

        form.input(&email, "me@example.com");
        assert!(!dom.borrow().has_class(&email, INVALID_CLASS));
        assert!(form.validate_field(&email));
        assert!(dom.borrow().has_class(&email, VALID_CLASS));
    }

    #[test]
    fn invalid_submit_shows_error_then_hides_it() {
        let dom = page();
        let form = form(&dom);
        let mut timeline = Timeline::default();
        let message = ElementId::from("form-message");

        assert!(!form.submit(&mut timeline));
        assert_eq!(dom.borrow().text(&message), Some(ERROR_MESSAGE));
        assert_eq!(dom.borrow().style(&message, "display"), Some("block"));

        timeline.advance(ms(5000));
        assert_eq!(dom.borrow().style(&message, "display"), Some("none"));
    }

    #[test]
    fn valid_submit_resets_after_delay() {
        let dom = page();
        let form = form(&dom);
        let mut timeline = Timeline::default();
        form.input(&"name".into(), "Ada");
        form.input(&"email".into(), "ada@example.com");

        assert!(form.submit(&mut timeline));
        assert!(dom.borrow().has_class(&"send".into(), LOADING_CLASS));

        timeline.advance(ms(2000));
        assert!(!dom.borrow().has_class(&"send".into(), LOADING_CLASS));
        assert_eq!(dom.borrow().text(&"form-message".into()), Some(SUCCESS_MESSAGE));
        assert_eq!(dom.borrow().attribute(&"name".into(), "value"), Some(""));
    }

    #[test]
    fn newer_message_restarts_hide_timer() {
        let dom = page();
        let form = form(&dom);
        let mut timeline = Timeline::default();
        let message = ElementId::from("form-message");

        form.show_message("first", MessageKind::Error, &mut timeline);
        timeline.advance(ms(4000));
        form.show_message("second", MessageKind::Success, &mut timeline);
        timeline.advance(ms(4000));
        assert_eq!(dom.borrow().style(&message, "display"), Some("block"));

        timeline.advance(ms(1000));
        assert_eq!(dom.borrow().style(&message, "display"), Some("none"));
    }
}
