//! The window-surface collaborator: the one seam through which
//! platform-internal window-manager state is read.

use anyhow::Result;

use crate::node::NodeHandle;

/// Source of the currently displayed top-level surfaces (decorator views).
///
/// The backing state is platform-internal and typically reached through
/// reflective or otherwise unstable access; implementations confine that
/// access here so it stays swappable per platform version. The platform owns
/// the surfaces — this trait only reads them.
pub trait WindowSurfaceRegistry {
    /// All currently displayed decorator views, ordered least-recently-added
    /// first. Errors carry the reason the platform state could not be read;
    /// they are reported once per call, never cached.
    fn window_decor_views(&self) -> Result<Vec<NodeHandle>>;
}
