//! In-memory view tree and collaborator stubs for driving the fetcher in
//! tests, without a live UI platform behind them.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;

use crate::activity::{Activity, ActivityHandle, ActivityLifecycleSource, UiSynchronizer};
use crate::node::{NodeHandle, UiNode};
use crate::registry::WindowSurfaceRegistry;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A scripted tree node. The type chain carries the concrete type first and
/// its supertypes after, so supertype matching behaves like the platform's
/// assignability check.
pub struct FixtureNode {
    id: u64,
    type_chain: Vec<String>,
    parent: RefCell<Weak<FixtureNode>>,
    children: RefCell<Vec<Rc<FixtureNode>>>,
    text: Option<String>,
    text_display: bool,
    list_container: bool,
}

impl FixtureNode {
    pub fn with_type_chain(chain: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_chain: chain.iter().map(|s| s.to_string()).collect(),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: None,
            text_display: false,
            list_container: false,
        })
    }

    /// A plain widget of the given concrete type.
    pub fn widget(type_name: &str) -> Rc<Self> {
        Self::with_type_chain(&[type_name, "android.view.View"])
    }

    /// A container that can hold children, e.g. a layout.
    pub fn container(type_name: &str) -> Rc<Self> {
        Self::with_type_chain(&[type_name, "android.view.ViewGroup", "android.view.View"])
    }

    /// A text-displaying node.
    pub fn text_view(text: &str) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_chain: vec![
                "android.widget.TextView".to_string(),
                "android.view.View".to_string(),
            ],
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: Some(text.to_string()),
            text_display: true,
            list_container: false,
        })
    }

    /// An editable text node. Extends the text type, so it also matches
    /// supertype filters on `android.widget.TextView`.
    pub fn edit_text(text: &str) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_chain: vec![
                "android.widget.EditText".to_string(),
                "android.widget.TextView".to_string(),
                "android.view.View".to_string(),
            ],
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: Some(text.to_string()),
            text_display: true,
            list_container: false,
        })
    }

    /// A button. Carries a label but not the text-display capability.
    pub fn button(label: &str) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_chain: vec![
                "android.widget.Button".to_string(),
                "android.view.View".to_string(),
            ],
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: Some(label.to_string()),
            text_display: false,
            list_container: false,
        })
    }

    /// A scrollable list container.
    pub fn list() -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_chain: vec![
                "android.widget.ListView".to_string(),
                "android.view.ViewGroup".to_string(),
                "android.view.View".to_string(),
            ],
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: None,
            text_display: false,
            list_container: true,
        })
    }

    /// Attach `child` under `self`, wiring the weak parent back-pointer.
    pub fn add_child(self: &Rc<Self>, child: &Rc<FixtureNode>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(Rc::clone(child));
    }

    /// Point this node's parent link at an arbitrary node without attaching
    /// it as a child. Lets tests script malformed trees (parent cycles).
    pub fn set_parent(&self, parent: &Rc<FixtureNode>) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
    }

    pub fn handle(self: &Rc<Self>) -> NodeHandle {
        Rc::clone(self) as NodeHandle
    }
}

impl UiNode for FixtureNode {
    fn id(&self) -> u64 {
        self.id
    }

    fn type_name(&self) -> String {
        self.type_chain[0].clone()
    }

    fn is_instance_of(&self, type_name: &str) -> bool {
        self.type_chain.iter().any(|t| t == type_name)
    }

    fn parent(&self) -> Option<NodeHandle> {
        self.parent.borrow().upgrade().map(|p| p as NodeHandle)
    }

    fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    fn children(&self) -> Vec<NodeHandle> {
        self.children
            .borrow()
            .iter()
            .map(|c| Rc::clone(c) as NodeHandle)
            .collect()
    }

    fn is_text_display(&self) -> bool {
        self.text_display
    }

    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn is_list_container(&self) -> bool {
        self.list_container
    }
}

/// A scripted foreground activity with togglable window focus.
pub struct FixtureActivity {
    decor: RefCell<NodeHandle>,
    focused: Cell<bool>,
}

impl FixtureActivity {
    pub fn new(decor: NodeHandle, focused: bool) -> Rc<Self> {
        Rc::new(Self {
            decor: RefCell::new(decor),
            focused: Cell::new(focused),
        })
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.set(focused);
    }
}

impl Activity for FixtureActivity {
    fn has_window_focus(&self) -> bool {
        self.focused.get()
    }

    fn decor_view(&self) -> NodeHandle {
        Rc::clone(&self.decor.borrow())
    }
}

/// Lifecycle source whose current activity tests can swap at any point.
/// Cloning shares the underlying slot.
#[derive(Clone, Default)]
pub struct FixtureLifecycle {
    current: Rc<RefCell<Option<ActivityHandle>>>,
}

impl FixtureLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&self, activity: Option<ActivityHandle>) {
        *self.current.borrow_mut() = activity;
    }
}

impl ActivityLifecycleSource for FixtureLifecycle {
    fn current_activity(&self, _auto_create: bool) -> Option<ActivityHandle> {
        self.current.borrow().clone()
    }
}

/// Surface registry backed by a shared list of scripted surfaces. Can be told
/// to fail, standing in for a platform whose internals moved underneath us.
#[derive(Clone, Default)]
pub struct FixtureRegistry {
    surfaces: Rc<RefCell<Vec<NodeHandle>>>,
    failure: Rc<RefCell<Option<String>>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a surface; the newest surface sits last, as on the platform.
    pub fn push_surface(&self, surface: NodeHandle) {
        self.surfaces.borrow_mut().push(surface);
    }

    pub fn clear_surfaces(&self) {
        self.surfaces.borrow_mut().clear();
    }

    /// Make every subsequent read fail with the given message.
    pub fn fail_with(&self, message: &str) {
        *self.failure.borrow_mut() = Some(message.to_string());
    }
}

impl WindowSurfaceRegistry for FixtureRegistry {
    fn window_decor_views(&self) -> anyhow::Result<Vec<NodeHandle>> {
        if let Some(message) = self.failure.borrow().as_ref() {
            return Err(anyhow!("{message}"));
        }
        Ok(self.surfaces.borrow().clone())
    }
}

/// Idle synchronizer that records how often it was awaited.
#[derive(Clone, Default)]
pub struct FixtureSync {
    waits: Rc<Cell<usize>>,
}

impl FixtureSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_count(&self) -> usize {
        self.waits.get()
    }
}

impl UiSynchronizer for FixtureSync {
    fn wait_for_idle(&self) {
        self.waits.set(self.waits.get() + 1);
    }
}
