//! The fetcher: resolve the active decor surface, flatten its tree, filter.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use uiprobe_core::{
    ActivityLifecycleSource, NodeHandle, UiSynchronizer, WindowSurfaceRegistry,
};

use crate::error::FetchError;

/// Tuning for the upward parent-chain walks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Runtime type names that terminate the upward walk. A node whose parent
    /// carries one of these names is the top of the usable tree. Covers the
    /// platform's current and historical root-container names.
    pub root_sentinels: Vec<String>,
    /// Cap on parent-chain climbs. The platform guarantees the tree is
    /// acyclic; this bounds the walk anyway so a violated guarantee shows up
    /// as a warning instead of a hang.
    pub max_parent_hops: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            root_sentinels: vec![
                "android.view.ViewRootImpl".to_string(),
                "android.view.ViewRoot".to_string(),
            ],
            max_parent_hops: 128,
        }
    }
}

/// Locates on-screen widgets for a test driver.
///
/// Composes three collaborators it does not own: the platform's event-queue
/// synchronizer, the activity lifecycle source, and the window-surface
/// registry. Single-threaded by design; handles returned from one fetch must
/// not be shared across drivers without external serialization.
pub struct ViewFetcher {
    sync: Box<dyn UiSynchronizer>,
    activities: Box<dyn ActivityLifecycleSource>,
    registry: Box<dyn WindowSurfaceRegistry>,
    config: FetcherConfig,
}

impl ViewFetcher {
    pub fn new(
        sync: Box<dyn UiSynchronizer>,
        activities: Box<dyn ActivityLifecycleSource>,
        registry: Box<dyn WindowSurfaceRegistry>,
    ) -> Self {
        Self::with_config(sync, activities, registry, FetcherConfig::default())
    }

    pub fn with_config(
        sync: Box<dyn UiSynchronizer>,
        activities: Box<dyn ActivityLifecycleSource>,
        registry: Box<dyn WindowSurfaceRegistry>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            sync,
            activities,
            registry,
            config,
        }
    }

    /// The absolute top parent of `node`: the last ancestor reached before
    /// the parent chain ends or hits a root-container sentinel.
    pub fn top_parent(&self, node: &NodeHandle) -> NodeHandle {
        let mut current = Rc::clone(node);
        for _ in 0..self.config.max_parent_hops {
            match current.parent() {
                Some(parent) if !self.is_root_sentinel(&parent) => current = parent,
                _ => return current,
            }
        }
        warn!(
            hops = self.config.max_parent_hops,
            "parent chain exceeded hop cap, tree may contain a cycle"
        );
        current
    }

    /// The list row enclosing `node`: the nearest ancestor whose own parent
    /// is a list container, or the topmost node when no list encloses it.
    /// Maps a tapped descendant to the row a list-click should target.
    pub fn list_item_parent(&self, node: &NodeHandle) -> NodeHandle {
        let mut current = Rc::clone(node);
        for _ in 0..self.config.max_parent_hops {
            match current.parent() {
                Some(parent) if !parent.is_list_container() => current = parent,
                _ => return current,
            }
        }
        warn!(
            hops = self.config.max_parent_hops,
            "parent chain exceeded hop cap, tree may contain a cycle"
        );
        current
    }

    /// The decorator surface the driver should interact with.
    ///
    /// Best-effort heuristic, scanning surfaces newest-first: a focused
    /// activity selects its own decor view; an unfocused activity selects the
    /// first surface that is NOT its decor view, on the assumption that a
    /// transient overlay (dialog, menu) is drawn above it. When neither rule
    /// matches, the least-recently-added surface is returned.
    pub fn active_decor_view(&self) -> Result<NodeHandle, FetchError> {
        let surfaces = self
            .registry
            .window_decor_views()
            .map_err(FetchError::Registry)?;
        if surfaces.is_empty() {
            return Err(FetchError::NoActiveSurface);
        }
        let activity = self
            .activities
            .current_activity(false)
            .ok_or(FetchError::NoForegroundActivity)?;

        let decor = activity.decor_view();
        let focused = activity.has_window_focus();
        for surface in surfaces.iter().rev() {
            let is_own_decor = surface.id() == decor.id();
            if focused == is_own_decor {
                debug!(
                    focused,
                    surface = %surface.type_name(),
                    "selected decor surface"
                );
                return Ok(Rc::clone(surface));
            }
        }
        debug!("no surface matched the focus heuristic, falling back to the oldest");
        Ok(Rc::clone(&surfaces[0]))
    }

    /// Every node in the active decorator's tree, depth-first pre-order.
    ///
    /// Blocks until the platform's UI event queue is idle before reading the
    /// tree, so the result reflects the latest completed layout pass. An
    /// error means no UI is currently available, not that the UI is empty.
    pub fn views(&self) -> Result<Vec<NodeHandle>, FetchError> {
        self.sync.wait_for_idle();
        let root = self.active_decor_view()?;
        let mut out = Vec::new();
        collect_subtree(&root, &mut out);
        debug!(nodes = out.len(), "flattened active decor tree");
        Ok(out)
    }

    /// Every node reachable from `root`, depth-first pre-order. Scoped to the
    /// given subtree: no idle wait, no decor resolution.
    pub fn views_in(&self, root: &NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        collect_subtree(root, &mut out);
        out
    }

    /// The `index`-th node of the given runtime type, in traversal order.
    ///
    /// An out-of-range `index` is a test failure, not a recoverable error:
    /// this panics with a message naming the type and index, aborting the
    /// current test step. Fetch failures still surface as [`FetchError`].
    #[track_caller]
    pub fn view(&self, type_name: &str, index: usize) -> Result<NodeHandle, FetchError> {
        let views = self.current_views(type_name)?;
        let found = views.len();
        match views.into_iter().nth(index) {
            Some(view) => Ok(view),
            None => panic!(
                "no {} with index {} is found ({} present)",
                type_name, index, found
            ),
        }
    }

    /// All text-displaying nodes, in traversal order. With `parent` absent
    /// the whole active decor tree is fetched; otherwise only the subtree
    /// under `parent` is walked.
    pub fn current_text_views(
        &self,
        parent: Option<&NodeHandle>,
    ) -> Result<Vec<NodeHandle>, FetchError> {
        let all = match parent {
            None => self.views()?,
            Some(root) => self.views_in(root),
        };
        Ok(all.into_iter().filter(|n| n.is_text_display()).collect())
    }

    /// All nodes whose runtime type is `type_name` or a subtype of it, in
    /// traversal order. A subsequence of [`ViewFetcher::views`].
    pub fn current_views(&self, type_name: &str) -> Result<Vec<NodeHandle>, FetchError> {
        Ok(self
            .views()?
            .into_iter()
            .filter(|n| n.is_instance_of(type_name))
            .collect())
    }

    /// The currently displayed decorator surfaces, oldest first, or `None`
    /// when the registry cannot be read. Never panics or propagates; the
    /// failure is logged and swallowed here.
    pub fn window_decor_views(&self) -> Option<Vec<NodeHandle>> {
        match self.registry.window_decor_views() {
            Ok(surfaces) => Some(surfaces),
            Err(e) => {
                error!("window decor view lookup failed: {e:#}");
                None
            }
        }
    }

    fn is_root_sentinel(&self, node: &NodeHandle) -> bool {
        let name = node.type_name();
        self.config.root_sentinels.iter().any(|s| *s == name)
    }
}

/// Pre-order walk: the node itself, then each child's subtree left to right.
fn collect_subtree(node: &NodeHandle, out: &mut Vec<NodeHandle>) {
    out.push(Rc::clone(node));
    for child in node.children() {
        collect_subtree(&child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use uiprobe_core::fixture::{
        FixtureActivity, FixtureLifecycle, FixtureNode, FixtureRegistry, FixtureSync,
    };
    use uiprobe_core::UiNode;

    fn harness() -> (FixtureSync, FixtureLifecycle, FixtureRegistry, ViewFetcher) {
        let sync = FixtureSync::new();
        let lifecycle = FixtureLifecycle::new();
        let registry = FixtureRegistry::new();
        let fetcher = ViewFetcher::new(
            Box::new(sync.clone()),
            Box::new(lifecycle.clone()),
            Box::new(registry.clone()),
        );
        (sync, lifecycle, registry, fetcher)
    }

    /// Decor tree from the spec scenario: a layout holding two text views and
    /// a button.
    fn sample_screen() -> (Rc<FixtureNode>, Rc<FixtureNode>, Rc<FixtureNode>, Rc<FixtureNode>) {
        let decor = FixtureNode::container("android.widget.LinearLayout");
        let first = FixtureNode::text_view("first");
        let second = FixtureNode::text_view("second");
        let button = FixtureNode::button("ok");
        decor.add_child(&first);
        decor.add_child(&second);
        decor.add_child(&button);
        (decor, first, second, button)
    }

    fn foreground(
        lifecycle: &FixtureLifecycle,
        registry: &FixtureRegistry,
        decor: &Rc<FixtureNode>,
        focused: bool,
    ) -> Rc<FixtureActivity> {
        let activity = FixtureActivity::new(decor.handle(), focused);
        lifecycle.set_current(Some(activity.clone()));
        registry.push_surface(decor.handle());
        activity
    }

    #[test]
    fn test_top_parent_of_root_is_itself() {
        let (_, _, _, fetcher) = harness();
        let root = FixtureNode::container("android.widget.FrameLayout");
        let top = fetcher.top_parent(&root.handle());
        assert_eq!(top.id(), root.id());
    }

    #[test]
    fn test_top_parent_stops_below_root_sentinel() {
        let (_, _, _, fetcher) = harness();
        let view_root = FixtureNode::with_type_chain(&["android.view.ViewRootImpl"]);
        let decor = FixtureNode::container("com.android.internal.policy.DecorView");
        let layout = FixtureNode::container("android.widget.LinearLayout");
        let leaf = FixtureNode::text_view("leaf");
        view_root.add_child(&decor);
        decor.add_child(&layout);
        layout.add_child(&leaf);

        let top = fetcher.top_parent(&leaf.handle());
        assert_eq!(top.id(), decor.id());
    }

    #[test]
    fn test_top_parent_survives_parent_cycle() {
        let (_, _, _, fetcher) = harness();
        let a = FixtureNode::container("android.widget.FrameLayout");
        let b = FixtureNode::container("android.widget.FrameLayout");
        a.set_parent(&b);
        b.set_parent(&a);

        // Must terminate at the hop cap rather than spin forever.
        let top = fetcher.top_parent(&a.handle());
        assert!(top.id() == a.id() || top.id() == b.id());
    }

    #[test]
    fn test_list_item_parent_finds_row() {
        let (_, _, _, fetcher) = harness();
        let list = FixtureNode::list();
        let row = FixtureNode::container("android.widget.RelativeLayout");
        let label = FixtureNode::text_view("row label");
        list.add_child(&row);
        row.add_child(&label);

        let item = fetcher.list_item_parent(&label.handle());
        assert_eq!(item.id(), row.id());
    }

    #[test]
    fn test_list_item_parent_without_list_climbs_to_top() {
        let (_, _, _, fetcher) = harness();
        let root = FixtureNode::container("android.widget.FrameLayout");
        let leaf = FixtureNode::text_view("leaf");
        root.add_child(&leaf);

        let item = fetcher.list_item_parent(&leaf.handle());
        assert_eq!(item.id(), root.id());
    }

    #[test]
    fn test_active_decor_focused_selects_own_decor() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, ..) = sample_screen();
        foreground(&lifecycle, &registry, &decor, true);
        // A newer surface exists but the focused activity wins.
        let overlay = FixtureNode::container("android.widget.FrameLayout");
        registry.push_surface(overlay.handle());

        let active = fetcher.active_decor_view().unwrap();
        assert_eq!(active.id(), decor.id());
    }

    #[test]
    fn test_active_decor_unfocused_selects_newest_overlay() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, ..) = sample_screen();
        foreground(&lifecycle, &registry, &decor, false);
        let overlay = FixtureNode::container("android.widget.FrameLayout");
        registry.push_surface(overlay.handle());

        let active = fetcher.active_decor_view().unwrap();
        assert_eq!(active.id(), overlay.id());
    }

    #[test]
    fn test_active_decor_falls_back_to_oldest_surface() {
        let (_, lifecycle, registry, fetcher) = harness();
        // Unfocused activity whose decor is the only surface: neither rule
        // matches, so the least-recently-added surface is returned.
        let (decor, ..) = sample_screen();
        foreground(&lifecycle, &registry, &decor, false);

        let active = fetcher.active_decor_view().unwrap();
        assert_eq!(active.id(), decor.id());
    }

    #[test]
    fn test_active_decor_no_surfaces() {
        let (_, lifecycle, _registry, fetcher) = harness();
        let (decor, ..) = sample_screen();
        let activity = FixtureActivity::new(decor.handle(), true);
        lifecycle.set_current(Some(activity));
        // No surfaces pushed into the registry.

        assert!(matches!(
            fetcher.active_decor_view(),
            Err(FetchError::NoActiveSurface)
        ));
    }

    #[test]
    fn test_active_decor_no_foreground_activity() {
        let (_, _, registry, fetcher) = harness();
        let (decor, ..) = sample_screen();
        registry.push_surface(decor.handle());

        assert!(matches!(
            fetcher.active_decor_view(),
            Err(FetchError::NoForegroundActivity)
        ));
    }

    #[test]
    fn test_views_flattens_in_preorder() {
        let (sync, lifecycle, registry, fetcher) = harness();
        let (decor, first, second, button) = sample_screen();
        foreground(&lifecycle, &registry, &decor, true);

        let views = fetcher.views().unwrap();
        let ids: Vec<u64> = views.iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec![decor.id(), first.id(), second.id(), button.id()]);
        assert_eq!(sync.wait_count(), 1);
    }

    #[test]
    fn test_views_nested_preorder() {
        let (_, lifecycle, registry, fetcher) = harness();
        let decor = FixtureNode::container("android.widget.FrameLayout");
        let c0 = FixtureNode::container("android.widget.LinearLayout");
        let c00 = FixtureNode::text_view("a");
        let c01 = FixtureNode::text_view("b");
        let c1 = FixtureNode::button("c");
        decor.add_child(&c0);
        c0.add_child(&c00);
        c0.add_child(&c01);
        decor.add_child(&c1);
        foreground(&lifecycle, &registry, &decor, true);

        let ids: Vec<u64> = fetcher.views().unwrap().iter().map(|v| v.id()).collect();
        // c0's entire subtree precedes c1.
        assert_eq!(ids, vec![decor.id(), c0.id(), c00.id(), c01.id(), c1.id()]);
    }

    #[test]
    fn test_views_single_node_tree() {
        let (_, lifecycle, registry, fetcher) = harness();
        let decor = FixtureNode::container("android.widget.FrameLayout");
        foreground(&lifecycle, &registry, &decor, true);

        let views = fetcher.views().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].child_count(), 0);
    }

    #[test]
    fn test_views_registry_failure_is_typed() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, ..) = sample_screen();
        foreground(&lifecycle, &registry, &decor, true);
        registry.fail_with("mViews field moved");

        assert!(matches!(fetcher.views(), Err(FetchError::Registry(_))));
    }

    #[test]
    fn test_current_views_matches_supertypes_in_order() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, first, second, button) = sample_screen();
        let edit = FixtureNode::edit_text("typed");
        decor.add_child(&edit);
        foreground(&lifecycle, &registry, &decor, true);

        // EditText extends TextView, so the TextView filter picks it up too.
        let texts = fetcher.current_views("android.widget.TextView").unwrap();
        let ids: Vec<u64> = texts.iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id(), edit.id()]);

        let buttons = fetcher.current_views("android.widget.Button").unwrap();
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].id(), button.id());
    }

    #[test]
    fn test_view_by_index() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, _, second, _) = sample_screen();
        foreground(&lifecycle, &registry, &decor, true);

        let found = fetcher.view("android.widget.TextView", 1).unwrap();
        assert_eq!(found.id(), second.id());
    }

    #[test]
    #[should_panic(expected = "no android.widget.Button with index 3 is found")]
    fn test_view_out_of_range_names_type_and_index() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, ..) = sample_screen();
        foreground(&lifecycle, &registry, &decor, true);

        let _ = fetcher.view("android.widget.Button", 3);
    }

    #[test]
    fn test_current_text_views_full_fetch() {
        let (_, lifecycle, registry, fetcher) = harness();
        let (decor, first, second, _button) = sample_screen();
        foreground(&lifecycle, &registry, &decor, true);

        // Exactly the two text nodes, in traversal order; neither the
        // container nor the button has the text-display capability.
        let texts = fetcher.current_text_views(None).unwrap();
        let ids: Vec<u64> = texts.iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
    }

    #[test]
    fn test_current_text_views_scoped_to_subtree() {
        let (sync, _, _, fetcher) = harness();
        let decor = FixtureNode::container("android.widget.FrameLayout");
        let inner = FixtureNode::container("android.widget.LinearLayout");
        let inside = FixtureNode::text_view("inside");
        let outside = FixtureNode::text_view("outside");
        decor.add_child(&inner);
        decor.add_child(&outside);
        inner.add_child(&inside);

        let scoped = fetcher.current_text_views(Some(&inner.handle())).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id(), inside.id());
        assert_eq!(scoped[0].text().as_deref(), Some("inside"));
        // Subtree walks do not touch the platform or wait for idle.
        assert_eq!(sync.wait_count(), 0);
    }

    #[test]
    fn test_window_decor_views_swallows_registry_errors() {
        let (_, _, registry, fetcher) = harness();
        let decor = FixtureNode::container("android.widget.FrameLayout");
        registry.push_surface(decor.handle());
        assert_eq!(fetcher.window_decor_views().map(|s| s.len()), Some(1));

        registry.fail_with("access denied");
        assert!(fetcher.window_decor_views().is_none());
    }

    #[test]
    fn test_config_roundtrips_through_serde() {
        let config = FetcherConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: FetcherConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root_sentinels, config.root_sentinels);
        assert_eq!(back.max_parent_hops, config.max_parent_hops);

        // Omitted fields fall back to defaults.
        let sparse: FetcherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(sparse.max_parent_hops, 128);
    }
}
