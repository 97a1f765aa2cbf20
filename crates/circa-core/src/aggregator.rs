//! # Weight Aggregator
//!
//! Derives the weight of composite nodes from their children.
//!
//! - Atomic nodes keep their stored weight; a missing one counts as 0.0
//! - A composite weighs the sum of its direct children's effective weights
//! - A composite without children weighs 0.0
//! - A node reached again while still on the active path is a cycle
//! - Parent chains are checked before any weight is summed, so a loop
//!   through an atomic node is a cycle too
//!
//! The traversal runs on an explicit stack, so tree depth is bounded by
//! memory rather than by the thread stack. Results are memoized by node id
//! for the duration of one pass. Every node is requested in turn, so a cycle
//! that no root can reach is still reported.
//!
//! The aggregator only reads node slices. Persisting its output is the
//! caller's job (see `assembler::finalize`).

use crate::types::{CircaError, Node, NodeId};
use std::collections::{BTreeMap, BTreeSet};

/// One step of the iterative depth-first walk.
#[derive(Debug, Clone, Copy)]
enum Frame {
    /// First visit: push children.
    Enter(NodeId),
    /// All children resolved: sum them.
    Exit(NodeId),
}

/// Computes composite weights for the nodes of a single project.
#[derive(Debug)]
pub struct WeightAggregator<'a> {
    nodes: BTreeMap<NodeId, &'a Node>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
}

impl<'a> WeightAggregator<'a> {
    /// Index `nodes` by id and by parent.
    #[must_use]
    pub fn new(nodes: &'a [Node]) -> Self {
        let by_id: BTreeMap<NodeId, &'a Node> = nodes.iter().map(|n| (n.id, n)).collect();

        // Children in id order, so sums do not depend on input order.
        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for node in by_id.values() {
            if let Some(parent) = node.parent_id {
                children.entry(parent).or_default().push(node.id);
            }
        }

        Self {
            nodes: by_id,
            children,
        }
    }

    fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Aggregate weight of every composite node, keyed by id.
    ///
    /// # Errors
    ///
    /// `CycleDetected` if the parent links loop. No weights are returned then.
    pub fn aggregate(&self) -> Result<BTreeMap<NodeId, f64>, CircaError> {
        let effective = self.effective_weights()?;
        Ok(effective
            .into_iter()
            .filter(|(id, _)| self.nodes.get(id).is_some_and(|n| !n.atomic))
            .collect())
    }

    /// Effective weight of every node, atomic and composite.
    ///
    /// # Errors
    ///
    /// `CycleDetected` if the parent links loop.
    pub fn effective_weights(&self) -> Result<BTreeMap<NodeId, f64>, CircaError> {
        self.ensure_forest()?;
        let mut memo = BTreeMap::new();
        for &id in self.nodes.keys() {
            self.resolve(id, &mut memo)?;
        }
        Ok(memo)
    }

    /// Effective weight of one node.
    ///
    /// Returns `None` if `id` is not part of this aggregator's node set.
    pub fn weight_of(&self, id: NodeId) -> Result<Option<f64>, CircaError> {
        if !self.nodes.contains_key(&id) {
            return Ok(None);
        }
        self.ensure_forest()?;
        let mut memo = BTreeMap::new();
        self.resolve(id, &mut memo)?;
        Ok(memo.get(&id).copied())
    }

    /// Walk every parent chain; no node may be its own ancestor.
    ///
    /// # Errors
    ///
    /// `CycleDetected` naming the first node seen twice on one chain.
    pub fn ensure_forest(&self) -> Result<(), CircaError> {
        let mut settled: BTreeSet<NodeId> = BTreeSet::new();

        for &start in self.nodes.keys() {
            let mut chain = Vec::new();
            let mut on_chain = BTreeSet::new();
            let mut current = Some(start);

            while let Some(id) = current {
                if settled.contains(&id) {
                    break;
                }
                if !on_chain.insert(id) {
                    return Err(CircaError::CycleDetected(id));
                }
                chain.push(id);
                current = self.nodes.get(&id).and_then(|n| n.parent_id);
            }
            settled.extend(chain);
        }

        Ok(())
    }

    fn resolve(&self, start: NodeId, memo: &mut BTreeMap<NodeId, f64>) -> Result<(), CircaError> {
        if memo.contains_key(&start) {
            return Ok(());
        }

        let mut stack = vec![Frame::Enter(start)];
        let mut on_path = BTreeSet::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    if memo.contains_key(&id) {
                        continue;
                    }
                    let Some(node) = self.nodes.get(&id) else {
                        continue;
                    };
                    if node.atomic {
                        memo.insert(id, node.weight.unwrap_or(0.0));
                        continue;
                    }
                    if !on_path.insert(id) {
                        return Err(CircaError::CycleDetected(id));
                    }
                    stack.push(Frame::Exit(id));
                    for &child in self.children_of(id) {
                        if !memo.contains_key(&child) {
                            stack.push(Frame::Enter(child));
                        }
                    }
                }
                Frame::Exit(id) => {
                    let total: f64 = self
                        .children_of(id)
                        .iter()
                        .map(|child| memo.get(child).copied().unwrap_or(0.0))
                        .sum();
                    memo.insert(id, total);
                    on_path.remove(&id);
                }
            }
        }

        Ok(())
    }
}

/// Write aggregated weights into composite nodes. Atomic nodes are left alone.
pub fn apply_weights(nodes: &mut [Node], weights: &BTreeMap<NodeId, f64>) {
    for node in nodes.iter_mut().filter(|n| !n.atomic) {
        if let Some(weight) = weights.get(&node.id) {
            node.weight = Some(*weight);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
