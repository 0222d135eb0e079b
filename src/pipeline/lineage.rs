//! In-memory lineage graph of flow files
//!
//! Nodes live in a shared id-keyed table and hold parent links as id lists
//! (back-references only - a node never owns its parents). Nodes are created
//! lazily on the first event that mentions their id and are never removed;
//! pruning completed trees is a deliberately separate concern.

use crate::pipeline::types::ProvenanceEvent;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// One flow file in the lineage graph.
///
/// The completion flag only ever transitions false -> true, and only after
/// the node's own terminal event has been observed.
pub struct FlowFileNode {
    id: String,
    parent_ids: RwLock<Vec<String>>,
    root_id: RwLock<Option<String>>,
    last_event: RwLock<Option<Arc<ProvenanceEvent>>>,
    terminal_seen: AtomicBool,
    completed: AtomicBool,
}

impl FlowFileNode {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            parent_ids: RwLock::new(Vec::new()),
            root_id: RwLock::new(None),
            last_event: RwLock::new(None),
            terminal_seen: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Direct parent ids, in link order.
    pub fn parent_ids(&self) -> Vec<String> {
        self.parent_ids.read().unwrap().clone()
    }

    pub fn has_parents(&self) -> bool {
        !self.parent_ids.read().unwrap().is_empty()
    }

    /// Transitive ancestor with no parents, once known.
    pub fn root_id(&self) -> Option<String> {
        self.root_id.read().unwrap().clone()
    }

    pub fn last_event(&self) -> Option<Arc<ProvenanceEvent>> {
        self.last_event.read().unwrap().clone()
    }

    /// Whether this node's own terminal event has been observed.
    pub fn terminal_seen(&self) -> bool {
        self.terminal_seen.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Attempt the false -> true completion transition. Fails while the
    /// node's own terminal event has not been observed, and for every caller
    /// after the first successful one.
    pub fn try_complete(&self) -> bool {
        if !self.terminal_seen.load(Ordering::SeqCst) {
            return false;
        }
        self.completed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn observe(&self, event: &Arc<ProvenanceEvent>) {
        *self.last_event.write().unwrap() = Some(Arc::clone(event));
        if event.is_terminal {
            self.terminal_seen.store(true, Ordering::SeqCst);
        }
    }

    fn link_parent(&self, parent_id: &str) {
        let mut parents = self.parent_ids.write().unwrap();
        if !parents.iter().any(|p| p == parent_id) {
            parents.push(parent_id.to_string());
        }
    }

    fn adopt_root(&self, root_id: &str) {
        let mut root = self.root_id.write().unwrap();
        if root.is_none() {
            *root = Some(root_id.to_string());
        }
    }
}

/// Shared table of flow file nodes, keyed by flow file id.
///
/// Safe for concurrent registration from many producer threads; node-level
/// mutation is scoped to the one node being touched.
pub struct LineageGraph {
    nodes: DashMap<String, Arc<FlowFileNode>>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Register an event against the graph: create the node if absent, link
    /// parents (creating orphan parent nodes as needed - a missing parent
    /// never fails ingest), propagate the root id, and record the event as
    /// the node's last event.
    pub fn register(&self, event: &Arc<ProvenanceEvent>) -> Arc<FlowFileNode> {
        let node = self.get_or_create(&event.flow_file_id);

        for parent_id in &event.parent_flow_file_ids {
            let parent = self.get_or_create(parent_id);
            node.link_parent(parent_id);
            match parent.root_id() {
                Some(root) => node.adopt_root(&root),
                None => node.adopt_root(parent_id),
            }
        }
        if !node.has_parents() {
            node.adopt_root(&event.flow_file_id);
        }

        node.observe(event);
        node
    }

    pub fn get(&self, flow_file_id: &str) -> Option<Arc<FlowFileNode>> {
        self.nodes.get(flow_file_id).map(|n| Arc::clone(n.value()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn get_or_create(&self, flow_file_id: &str) -> Arc<FlowFileNode> {
        self.nodes
            .entry(flow_file_id.to_string())
            .or_insert_with(|| Arc::new(FlowFileNode::new(flow_file_id)))
            .value()
            .clone()
    }
}

impl Default for LineageGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::EventKind;

    fn make_event(id: u64, flow_file_id: &str, parents: &[&str], terminal: bool) -> Arc<ProvenanceEvent> {
        let mut event = ProvenanceEvent::new(
            id,
            "sales",
            "extract",
            flow_file_id,
            EventKind::Receive,
            1_700_000_000_000 + id as i64,
        );
        event.parent_flow_file_ids = parents.iter().map(|p| p.to_string()).collect();
        event.is_terminal = terminal;
        Arc::new(event)
    }

    #[test]
    fn test_register_creates_node_and_records_last_event() {
        let graph = LineageGraph::new();
        let event = make_event(1, "ff-a", &[], false);

        let node = graph.register(&event);

        assert_eq!(node.id(), "ff-a");
        assert_eq!(graph.len(), 1);
        assert_eq!(node.last_event().unwrap().event_id, 1);
        assert!(!node.terminal_seen());
    }

    #[test]
    fn test_register_links_parents_without_duplicates() {
        let graph = LineageGraph::new();
        graph.register(&make_event(1, "ff-child", &["ff-parent"], false));
        graph.register(&make_event(2, "ff-child", &["ff-parent"], false));

        let child = graph.get("ff-child").unwrap();
        assert_eq!(child.parent_ids(), vec!["ff-parent".to_string()]);
        // The parent node was created lazily as an orphan
        assert!(graph.get("ff-parent").is_some());
    }

    #[test]
    fn test_root_id_propagates_from_parent() {
        let graph = LineageGraph::new();
        graph.register(&make_event(1, "ff-root", &[], false));
        graph.register(&make_event(2, "ff-mid", &["ff-root"], false));
        graph.register(&make_event(3, "ff-leaf", &["ff-mid"], false));

        assert_eq!(graph.get("ff-root").unwrap().root_id().unwrap(), "ff-root");
        assert_eq!(graph.get("ff-mid").unwrap().root_id().unwrap(), "ff-root");
        assert_eq!(graph.get("ff-leaf").unwrap().root_id().unwrap(), "ff-root");
    }

    #[test]
    fn test_completion_requires_terminal_event() {
        let graph = LineageGraph::new();
        let node = graph.register(&make_event(1, "ff-a", &[], false));

        assert!(!node.try_complete());

        graph.register(&make_event(2, "ff-a", &[], true));
        assert!(node.terminal_seen());
        assert!(node.try_complete());
    }

    #[test]
    fn test_completion_flag_is_monotonic() {
        // Test: once complete, a node stays complete and no later caller
        // wins the transition again
        let graph = LineageGraph::new();
        let node = graph.register(&make_event(1, "ff-a", &[], true));

        assert!(node.try_complete());
        assert!(node.is_complete());
        assert!(!node.try_complete());
        assert!(node.is_complete());

        graph.register(&make_event(2, "ff-a", &[], false));
        assert!(node.is_complete());
    }

    #[test]
    fn test_concurrent_completion_has_single_winner() {
        let graph = Arc::new(LineageGraph::new());
        let node = graph.register(&make_event(1, "ff-a", &[], true));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let node = Arc::clone(&node);
            handles.push(std::thread::spawn(move || node.try_complete()));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
