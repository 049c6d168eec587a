//! Per-lobby session state: anchors, materialized nodes, paths, winners.

use std::collections::HashMap;
use std::sync::Arc;

use degrees_protocol::{ArtistNode, NodeId, PlayerId};

/// The result of applying one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The mover's full path after the move.
    pub path: Vec<NodeId>,
    /// `path.len() - 1`.
    pub steps: usize,
    /// The move landed on the target.
    pub has_won: bool,
    /// This is the first win of the session.
    pub first_win: bool,
}

/// One running session.
///
/// Invariants:
/// - every path starts with `start`;
/// - every id in any path has an entry in `nodes`;
/// - `nodes` only grows.
#[derive(Debug)]
pub struct GameSession {
    start: NodeId,
    target: NodeId,
    candidates: Arc<Vec<NodeId>>,
    nodes: HashMap<NodeId, Arc<ArtistNode>>,
    paths: HashMap<PlayerId, Vec<NodeId>>,
    winners: Vec<PlayerId>,
}

impl GameSession {
    /// Seeds every participant's path with the start node.
    pub fn new(
        start: Arc<ArtistNode>,
        target: Arc<ArtistNode>,
        candidates: Arc<Vec<NodeId>>,
        participants: impl IntoIterator<Item = PlayerId>,
    ) -> Self {
        let start_id = start.id.clone();
        let paths = participants
            .into_iter()
            .map(|id| (id, vec![start_id.clone()]))
            .collect();

        let mut nodes = HashMap::new();
        nodes.insert(start.id.clone(), start);
        let target_id = target.id.clone();
        nodes.insert(target.id.clone(), target);

        Self {
            start: start_id,
            target: target_id,
            candidates,
            nodes,
            paths,
            winners: Vec::new(),
        }
    }

    pub fn start(&self) -> &NodeId {
        &self.start
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn candidates(&self) -> &[NodeId] {
        &self.candidates
    }

    /// A node already materialized in this session.
    pub fn node(&self, id: &NodeId) -> Option<Arc<ArtistNode>> {
        self.nodes.get(id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A participant's path, if they have moved or were present at start.
    pub fn path(&self, player_id: PlayerId) -> Option<&[NodeId]> {
        self.paths.get(&player_id).map(Vec::as_slice)
    }

    pub fn winners(&self) -> &[PlayerId] {
        &self.winners
    }

    /// Moves `player_id` to `node`.
    ///
    /// The node is materialized first. A participant without a path (joined
    /// after the start) is seeded with `[start]`. Moving to the node already
    /// at the tail leaves the path unchanged; revisiting earlier nodes
    /// appends them again.
    pub fn apply_move(&mut self, player_id: PlayerId, node: Arc<ArtistNode>) -> MoveOutcome {
        let node_id = node.id.clone();
        self.nodes.entry(node_id.clone()).or_insert(node);

        let path = self
            .paths
            .entry(player_id)
            .or_insert_with(|| vec![self.start.clone()]);
        if path.last() != Some(&node_id) {
            path.push(node_id.clone());
        }
        let path = path.clone();

        let has_won = node_id == self.target;
        let first_win = has_won && self.winners.is_empty();
        if has_won && !self.winners.contains(&player_id) {
            self.winners.push(player_id);
        }

        MoveOutcome {
            steps: path.len() - 1,
            path,
            has_won,
            first_win,
        }
    }
}
