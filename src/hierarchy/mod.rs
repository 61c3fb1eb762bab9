//! # Hierarchy Builder
//!
//! Turns a flat, outline-ordered list of source rows into a plan of levels that can be
//! materialized parents-first.
//!
//! Depth in the source is an indentation signal, not a validated tree. The builder walks the
//! rows with a stack of open ancestors and repairs anything that cannot be placed instead of
//! failing: a malformed depth only affects the offending subtree, and every repair is reported
//! as a [`StructuralWarning`].
//!
//! ```rust
//! use project_migrator::hierarchy::{HierarchyBuilder, HierarchyNode};
//!
//! let plan = HierarchyBuilder::default().build_plan(vec![
//!     HierarchyNode::new("A", 0, 0),
//!     HierarchyNode::new("B", 1, 1),
//!     HierarchyNode::new("C", 0, 2),
//! ]);
//!
//! assert_eq!(plan.levels().len(), 2);
//! assert_eq!(plan.parent_of("B"), Some("A"));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, MigrationResult};
use crate::logging;
use crate::remote::RowId;

/// What to do with a node whose reported depth has no ancestor one level up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Place the node at depth 0
    #[default]
    ReattachToRoot,
    /// Attach the node under the nearest open ancestor
    AttachToNearestAncestor,
}

/// One source row's position in the outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Source-system identifier, stable across runs
    pub external_id: String,
    /// Reported depth on input, resolved depth in a [`HierarchyPlan`]
    pub depth: u32,
    /// Set by the builder; `None` only at depth 0
    pub parent_external_id: Option<String>,
    /// Sort key; ties keep source order
    pub ordinal: u64,
}

impl HierarchyNode {
    pub fn new(external_id: impl Into<String>, depth: u32, ordinal: u64) -> Self {
        Self {
            external_id: external_id.into(),
            depth,
            parent_external_id: None,
            ordinal,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_external_id.is_none()
    }
}

/// A repair the builder applied instead of rejecting input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StructuralWarning {
    /// No open ancestor at `reported_depth - 1`
    Orphan {
        external_id: String,
        reported_depth: u32,
        resolved_depth: u32,
        attached_to: Option<String>,
    },
    /// A later row reused an external id; it was dropped
    DuplicateExternalId { external_id: String, ordinal: u64 },
}

impl StructuralWarning {
    pub fn external_id(&self) -> &str {
        match self {
            StructuralWarning::Orphan { external_id, .. }
            | StructuralWarning::DuplicateExternalId { external_id, .. } => external_id,
        }
    }
}

impl fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralWarning::Orphan {
                external_id,
                reported_depth,
                resolved_depth,
                attached_to: Some(parent),
            } => write!(
                f,
                "row '{external_id}' at depth {reported_depth} has no parent one level up; attached under '{parent}' at depth {resolved_depth}"
            ),
            StructuralWarning::Orphan {
                external_id,
                reported_depth,
                ..
            } => write!(
                f,
                "row '{external_id}' at depth {reported_depth} has no parent one level up; moved to the root level"
            ),
            StructuralWarning::DuplicateExternalId {
                external_id,
                ordinal,
            } => write!(f, "row '{external_id}' (ordinal {ordinal}) repeats an earlier id and was skipped"),
        }
    }
}

/// Levels ordered shallowest-first plus the external id to row id mapping filled in as each
/// level is written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyPlan {
    levels: Vec<Vec<HierarchyNode>>,
    warnings: Vec<StructuralWarning>,
    row_ids: HashMap<String, RowId>,
}

impl HierarchyPlan {
    pub fn levels(&self) -> &[Vec<HierarchyNode>] {
        &self.levels
    }

    pub fn level(&self, depth: usize) -> Option<&[HierarchyNode]> {
        self.levels.get(depth).map(Vec::as_slice)
    }

    pub fn warnings(&self) -> &[StructuralWarning] {
        &self.warnings
    }

    pub fn nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.levels.iter().flatten()
    }

    pub fn node(&self, external_id: &str) -> Option<&HierarchyNode> {
        self.nodes().find(|node| node.external_id == external_id)
    }

    pub fn parent_of(&self, external_id: &str) -> Option<&str> {
        self.node(external_id)
            .and_then(|node| node.parent_external_id.as_deref())
    }

    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Deepest resolved depth, `None` for an empty plan
    pub fn max_depth(&self) -> Option<u32> {
        self.levels.len().checked_sub(1).map(|depth| depth as u32)
    }

    /// Record the remote row created for `external_id`
    pub fn record_row_id(&mut self, external_id: impl Into<String>, row_id: RowId) {
        self.row_ids.insert(external_id.into(), row_id);
    }

    pub fn row_id(&self, external_id: &str) -> Option<RowId> {
        self.row_ids.get(external_id).copied()
    }

    /// Remote row id of `node`'s parent; fails if the parent has not been written yet
    pub fn parent_row_id(&self, node: &HierarchyNode) -> MigrationResult<Option<RowId>> {
        match &node.parent_external_id {
            None => Ok(None),
            Some(parent) => self
                .row_id(parent)
                .map(Some)
                .ok_or_else(|| MigrationError::UnresolvedParent {
                    external_id: node.external_id.clone(),
                    parent: parent.clone(),
                }),
        }
    }

    pub fn materialized_count(&self) -> usize {
        self.row_ids.len()
    }
}

struct OpenAncestor {
    reported_depth: u32,
    resolved_depth: u32,
    external_id: String,
}

/// Builds [`HierarchyPlan`]s; no I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyBuilder {
    policy: OrphanPolicy,
}

impl HierarchyBuilder {
    pub fn new(policy: OrphanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OrphanPolicy {
        self.policy
    }

    pub fn build_plan(&self, nodes: impl IntoIterator<Item = HierarchyNode>) -> HierarchyPlan {
        let mut nodes: Vec<HierarchyNode> = nodes.into_iter().collect();
        nodes.sort_by_key(|node| node.ordinal);

        let mut plan = HierarchyPlan::default();
        let mut stack: Vec<OpenAncestor> = Vec::new();
        let mut seen: HashSet<String> = HashSet::with_capacity(nodes.len());

        for mut node in nodes {
            if !seen.insert(node.external_id.clone()) {
                logging::log_structural_warning(&node.external_id, node.depth, node.depth, "duplicate external id");
                plan.warnings.push(StructuralWarning::DuplicateExternalId {
                    external_id: node.external_id,
                    ordinal: node.ordinal,
                });
                continue;
            }

            let reported = node.depth;
            while stack.last().is_some_and(|open| open.reported_depth >= reported) {
                stack.pop();
            }

            let (parent, resolved) = match stack.last() {
                _ if reported == 0 => (None, 0),
                Some(open) if open.reported_depth + 1 == reported => {
                    (Some(open.external_id.clone()), open.resolved_depth + 1)
                }
                nearest => {
                    let placement = match (self.policy, nearest) {
                        (OrphanPolicy::AttachToNearestAncestor, Some(open)) => {
                            (Some(open.external_id.clone()), open.resolved_depth + 1)
                        }
                        _ => (None, 0),
                    };
                    logging::log_structural_warning(
                        &node.external_id,
                        reported,
                        placement.1,
                        "no ancestor one level up",
                    );
                    plan.warnings.push(StructuralWarning::Orphan {
                        external_id: node.external_id.clone(),
                        reported_depth: reported,
                        resolved_depth: placement.1,
                        attached_to: placement.0.clone(),
                    });
                    placement
                }
            };

            stack.push(OpenAncestor {
                reported_depth: reported,
                resolved_depth: resolved,
                external_id: node.external_id.clone(),
            });

            node.depth = resolved;
            node.parent_external_id = parent;
            let level = resolved as usize;
            if plan.levels.len() <= level {
                plan.levels.resize_with(level + 1, Vec::new);
            }
            plan.levels[level].push(node);
        }

        plan
    }
}
