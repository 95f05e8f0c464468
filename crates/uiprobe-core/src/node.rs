//! Opaque handles to displayed widgets.

use std::fmt;
use std::rc::Rc;

/// Shared handle to a node in the platform's view tree.
///
/// `Rc`, not `Arc`: the whole library is driven by a single test thread and
/// platform-backed nodes are not safe to message from anywhere else.
pub type NodeHandle = Rc<dyn UiNode>;

/// Read-only view over one displayed widget.
///
/// The platform owns the tree; a `UiNode` is a best-effort window into it.
/// Implementations must never panic — a node that can no longer answer a
/// structural question reports the empty answer (`None`, zero children)
/// instead.
pub trait UiNode {
    /// Identity stable for the lifetime of the underlying widget. Two handles
    /// wrap the same widget iff their ids are equal.
    fn id(&self) -> u64;

    /// Fully qualified runtime type name, e.g. `android.widget.TextView`.
    fn type_name(&self) -> String;

    /// Type-compatibility test: true for the node's exact runtime type and
    /// every supertype the platform reports for it. The default only knows
    /// the exact type.
    fn is_instance_of(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    /// Weak back-pointer into the surrounding tree. `None` at a root, or when
    /// the platform has already detached the widget.
    fn parent(&self) -> Option<NodeHandle>;

    /// Number of direct children. Zero unless the node is a container.
    fn child_count(&self) -> usize {
        0
    }

    /// Direct children, left to right. Empty unless the node is a container.
    fn children(&self) -> Vec<NodeHandle> {
        Vec::new()
    }

    /// Whether this node displays user-visible text.
    fn is_text_display(&self) -> bool {
        false
    }

    /// The displayed text, if this is a text node.
    fn text(&self) -> Option<String> {
        None
    }

    /// Whether this node is a scrollable list whose rows are located by
    /// climbing ancestors from a tapped descendant.
    fn is_list_container(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn UiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiNode")
            .field("id", &self.id())
            .field("type_name", &self.type_name())
            .finish()
    }
}
