//! Element kinds and dense element indexes.
//!
//! Every graph element lives in a dense per-kind index space `[0, count)`.
//! Indexes move when another element of the same kind is removed, so they
//! must never be held across a mutation; the string id is the stable
//! identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of element tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A graph node.
    Node,
    /// A graph edge.
    Edge,
    /// A sprite attached to the view. Never populated by the registry.
    Sprite,
}

impl ElementKind {
    /// Number of element kinds.
    pub const COUNT: usize = 3;

    /// All kinds, in slot order.
    pub const ALL: [ElementKind; Self::COUNT] =
        [ElementKind::Node, ElementKind::Edge, ElementKind::Sprite];

    /// Position of this kind in per-kind tables.
    #[inline]
    pub fn slot(self) -> usize {
        match self {
            Self::Node => 0,
            Self::Edge => 1,
            Self::Sprite => 2,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Sprite => "sprite",
        })
    }
}

/// A (kind, dense index, stable id) triple.
///
/// Borrowed from the registry; valid until the next structural mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementIndex<'a> {
    /// Element kind.
    pub kind: ElementKind,
    /// Dense index in `[0, count)`.
    pub index: u32,
    /// Stable string id.
    pub id: &'a str,
}

impl ElementIndex<'_> {
    /// Dense index as a `usize`, for slice addressing.
    #[inline]
    pub fn slot(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ElementIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}@{})", self.kind, self.id, self.index)
    }
}
