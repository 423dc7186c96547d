//! Fullscreen tracking for page content.
//!
//! The web view reports every change of its "contains a fullscreen element"
//! flag, including repeats. Only real transitions should touch the window.

/// What the window should do after a fullscreen notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FullscreenChange {
    /// Go borderless fullscreen on the current monitor.
    Enter,
    /// Restore the placement the window had before entering.
    Leave,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FullscreenTracker {
    active: bool,
}

impl FullscreenTracker {
    pub(crate) fn is_active(self) -> bool {
        self.active
    }

    /// Record the web view's new state, returning the change to apply, if any.
    pub(crate) fn update(&mut self, contains_fullscreen_element: bool) -> Option<FullscreenChange> {
        if contains_fullscreen_element == self.active {
            return None;
        }
        self.active = contains_fullscreen_element;
        Some(if self.active {
            FullscreenChange::Enter
        } else {
            FullscreenChange::Leave
        })
    }
}
