//! Ancestor completion tracking
//!
//! When a flow file ends, each of its direct parents is re-checked: a parent
//! whose own terminal event has been observed wins its set-once completion
//! flag and gets a synthesized completion stats record. Each terminal event
//! re-triggers the check, so deep lineage trees complete bottom-up as
//! terminal events arrive for each level.

use crate::pipeline::lineage::LineageGraph;
use crate::pipeline::stats::StatsProvider;
use crate::pipeline::types::{EventStats, ProvenanceEvent};
use std::sync::Arc;

pub struct CompletionTracker {
    graph: Arc<LineageGraph>,
    stats_provider: Arc<dyn StatsProvider>,
}

impl CompletionTracker {
    pub fn new(graph: Arc<LineageGraph>, stats_provider: Arc<dyn StatsProvider>) -> Self {
        Self {
            graph,
            stats_provider,
        }
    }

    /// Check the direct parents of the event's flow file and return, for
    /// each parent that completed just now, its last event and the
    /// synthesized completion stats. Re-invoking for the same event is a
    /// no-op: the parent's completion flag admits exactly one winner.
    ///
    /// The caller feeds each returned record into the matching window
    /// exactly once.
    pub fn complete_ancestors(
        &self,
        event: &Arc<ProvenanceEvent>,
    ) -> Vec<(Arc<ProvenanceEvent>, EventStats)> {
        let mut completed = Vec::new();
        if !event.is_terminal || !event.has_lineage_identity() {
            return completed;
        }
        let node = match self.graph.get(&event.flow_file_id) {
            Some(node) => node,
            None => return completed,
        };

        for parent_id in node.parent_ids() {
            let parent = match self.graph.get(&parent_id) {
                Some(parent) => parent,
                None => continue,
            };
            if !parent.try_complete() {
                continue;
            }
            let last_event = match parent.last_event() {
                Some(last_event) => last_event,
                None => continue,
            };
            log::debug!(
                "flow file {} complete (triggered by event {} on {})",
                parent_id,
                event.event_id,
                event.flow_file_id
            );
            if let Some(stats) = self
                .stats_provider
                .completion_stats(&last_event.feed_name, &last_event)
            {
                completed.push((last_event, stats));
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::DefaultStatsProvider;
    use crate::pipeline::types::EventKind;

    fn tracker(graph: &Arc<LineageGraph>) -> CompletionTracker {
        CompletionTracker::new(Arc::clone(graph), Arc::new(DefaultStatsProvider))
    }

    fn ingest(
        graph: &Arc<LineageGraph>,
        id: u64,
        flow_file_id: &str,
        parents: &[&str],
        terminal: bool,
    ) -> Arc<ProvenanceEvent> {
        let mut event = ProvenanceEvent::new(
            id,
            "sales",
            "extract",
            flow_file_id,
            EventKind::Drop,
            1_000 + id as i64,
        );
        event.parent_flow_file_ids = parents.iter().map(|p| p.to_string()).collect();
        event.is_terminal = terminal;
        let event = Arc::new(event);
        graph.register(&event);
        event
    }

    #[test]
    fn test_parent_completes_when_terminal_seen() {
        let graph = Arc::new(LineageGraph::new());
        let tracker = tracker(&graph);

        ingest(&graph, 1, "ff-parent", &[], true);
        let child_end = ingest(&graph, 2, "ff-child", &["ff-parent"], true);

        let completed = tracker.complete_ancestors(&child_end);
        assert_eq!(completed.len(), 1);
        let (last_event, stats) = &completed[0];
        assert_eq!(last_event.flow_file_id, "ff-parent");
        assert_eq!(stats.jobs_finished, 1);
        assert!(graph.get("ff-parent").unwrap().is_complete());
    }

    #[test]
    fn test_parent_without_terminal_event_is_not_completed() {
        let graph = Arc::new(LineageGraph::new());
        let tracker = tracker(&graph);

        ingest(&graph, 1, "ff-parent", &[], false);
        let child_end = ingest(&graph, 2, "ff-child", &["ff-parent"], true);

        assert!(tracker.complete_ancestors(&child_end).is_empty());
        assert!(!graph.get("ff-parent").unwrap().is_complete());
    }

    #[test]
    fn test_redelivered_terminal_event_completes_at_most_once() {
        // Test: the completion flag admits one winner across redeliveries
        let graph = Arc::new(LineageGraph::new());
        let tracker = tracker(&graph);

        ingest(&graph, 1, "ff-parent", &[], true);
        let child_end = ingest(&graph, 2, "ff-child", &["ff-parent"], true);

        assert_eq!(tracker.complete_ancestors(&child_end).len(), 1);
        assert!(tracker.complete_ancestors(&child_end).is_empty());
    }

    #[test]
    fn test_two_children_complete_parent_exactly_once() {
        // Parent terminal arrives between the two child terminals: the first
        // child finds the parent not yet terminal, the second one completes it.
        let graph = Arc::new(LineageGraph::new());
        let tracker = tracker(&graph);

        ingest(&graph, 1, "ff-parent", &[], false);
        ingest(&graph, 2, "ff-child-1", &["ff-parent"], false);
        ingest(&graph, 3, "ff-child-2", &["ff-parent"], false);

        let child1_end = ingest(&graph, 4, "ff-child-1", &["ff-parent"], true);
        assert!(tracker.complete_ancestors(&child1_end).is_empty());

        ingest(&graph, 5, "ff-parent", &[], true);

        let child2_end = ingest(&graph, 6, "ff-child-2", &["ff-parent"], true);
        let completed = tracker.complete_ancestors(&child2_end);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0.flow_file_id, "ff-parent");
    }

    #[test]
    fn test_non_terminal_event_is_ignored() {
        let graph = Arc::new(LineageGraph::new());
        let tracker = tracker(&graph);

        ingest(&graph, 1, "ff-parent", &[], true);
        let child_mid = ingest(&graph, 2, "ff-child", &["ff-parent"], false);

        assert!(tracker.complete_ancestors(&child_mid).is_empty());
    }
}
