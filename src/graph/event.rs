//! Registry notifications and raw topology events.

use serde::{Deserialize, Serialize};

use super::ElementKind;

/// A structural change of one per-kind index space.
///
/// For one removal, `Swapped` (if any) is always emitted before `Removed`.
/// `Swapped` carries no payload: the element that occupied `from` now
/// occupies `to`, and `from` is the slot about to be vacated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEvent {
    /// A new slot `index` was appended; the count is now `index + 1`.
    Added {
        /// Element kind.
        kind: ElementKind,
        /// The new slot.
        index: u32,
    },
    /// The trailing slot `index` was vacated; the count is now `index`.
    Removed {
        /// Element kind.
        kind: ElementKind,
        /// The vacated slot.
        index: u32,
    },
    /// The element at `from` (the last slot) was relocated to `to`.
    Swapped {
        /// Element kind.
        kind: ElementKind,
        /// Old slot of the relocated element.
        from: u32,
        /// New slot of the relocated element.
        to: u32,
    },
    /// Every kind was reset to zero elements.
    Cleared,
}

impl IndexEvent {
    /// The kind this event applies to, `None` for [`IndexEvent::Cleared`].
    pub fn kind(&self) -> Option<ElementKind> {
        match *self {
            Self::Added { kind, .. } | Self::Removed { kind, .. } | Self::Swapped { kind, .. } => {
                Some(kind)
            }
            Self::Cleared => None,
        }
    }
}

/// Raw topology events produced by a graph source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TopologyEvent {
    /// A node appeared.
    NodeAdded {
        /// Node id.
        id: String,
    },
    /// A node disappeared, along with its edges.
    NodeRemoved {
        /// Node id.
        id: String,
    },
    /// An edge appeared.
    EdgeAdded {
        /// Edge id.
        id: String,
        /// Source node id.
        source: String,
        /// Target node id.
        target: String,
        /// Whether the edge is directed.
        directed: bool,
    },
    /// An edge disappeared.
    EdgeRemoved {
        /// Edge id.
        id: String,
    },
    /// The whole graph was cleared.
    Cleared,
}
