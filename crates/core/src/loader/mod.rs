use std::{cell::Cell, rc::Rc, time::Duration};

use crate::{
    dom::{ElementId, SharedDom},
    timeline::Timeline,
};

pub const HIDDEN_CLASS: &str = "hidden";

/// Fades the page loader out once the page has loaded and clears the
/// session's loading flag when it is gone.
#[derive(Debug, Clone)]
pub struct Loader {
    dom: SharedDom,
    target: ElementId,
    fade: Duration,
    loading: Rc<Cell<bool>>,
}

impl Loader {
    pub fn new(dom: SharedDom, target: ElementId, fade: Duration, loading: Rc<Cell<bool>>) -> Self {
        Self {
            dom,
            target,
            fade,
            loading,
        }
    }

    /// Starts the fade. Returns `false` when there is no loader element, in
    /// which case the loading flag is left untouched.
    pub fn hide(&self, timeline: &mut Timeline) -> bool {
        if !self.dom.borrow().contains(&self.target) {
            tracing::debug!(element = %self.target, "loader absent");
            return false;
        }

        self.dom.borrow_mut().add_class(&self.target, HIDDEN_CLASS);
        let dom = self.dom.clone();
        let target = self.target.clone();
        let loading = Rc::clone(&self.loading);
        timeline.schedule(self.fade, move |_| {
            dom.borrow_mut().set_style(&target, "display", "none");
            loading.set(false);
            tracing::debug!("loader removed");
        });
        true
    }
}
