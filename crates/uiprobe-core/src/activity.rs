//! Collaborator traits over the host platform's activity and event-queue
//! state. The fetcher consumes these; it never tracks lifecycle itself.

use std::rc::Rc;

use crate::node::NodeHandle;

/// Handle to the currently foregrounded screen.
pub type ActivityHandle = Rc<dyn Activity>;

/// The slice of an activity the fetcher needs: its focus state and the root
/// decorator node of its own window.
pub trait Activity {
    /// Whether the activity's window currently has input focus. `false`
    /// usually means a transient overlay (dialog, menu) is drawn above it.
    fn has_window_focus(&self) -> bool;

    /// The decorator node of the activity's own window.
    fn decor_view(&self) -> NodeHandle;
}

/// Source of the currently foregrounded activity.
pub trait ActivityLifecycleSource {
    /// The current foreground activity, or `None` if nothing is foregrounded.
    ///
    /// With `auto_create = false` the call must be non-blocking and must not
    /// launch anything. The fetcher only ever passes `false`.
    fn current_activity(&self, auto_create: bool) -> Option<ActivityHandle>;
}

/// Blocks the driving thread until the platform's UI event queue is idle.
pub trait UiSynchronizer {
    /// Returns once the UI thread has no pending layout or animation work.
    /// Establishes the happens-before edge required before any structural
    /// read of the tree. Not bounded here; the external driver bounds it.
    fn wait_for_idle(&self);
}
