//! Error taxonomy.
//!
//! Data errors coming from external event streams (`DuplicateId`,
//! `UnknownId`, `DanglingEndpoint`, `InvalidAttribute`) are returned and
//! recovered by the caller. Internal consistency errors
//! (`ComponentOutOfRange`, `IndexOutOfRange`, `AllocationFailure`,
//! `TypeMismatch`) are never returned: they are raised through [`fatal`]
//! because they mean the swap-remove invariant was broken.

use std::error::Error;
use std::fmt;

use crate::graph::ElementKind;

/// Errors raised by the registry, the buffer swapper and the layout.
#[derive(Clone, Debug, PartialEq)]
pub enum NuiError {
    /// An element with this id is already registered.
    DuplicateId {
        /// Kind of the element.
        kind: ElementKind,
        /// The offending id.
        id: String,
    },
    /// No element with this id is registered.
    UnknownId {
        /// Kind of the element.
        kind: ElementKind,
        /// The unknown id.
        id: String,
    },
    /// An edge names an endpoint node that does not exist and could not be
    /// created.
    DanglingEndpoint {
        /// The edge being added.
        edge: String,
        /// The missing endpoint.
        node: String,
    },
    /// Buffer access past the per-element component count.
    ComponentOutOfRange {
        /// Requested component.
        component: usize,
        /// Components per element of the buffer.
        components: usize,
    },
    /// Stale or out-of-range element index.
    IndexOutOfRange {
        /// Kind of the element.
        kind: ElementKind,
        /// Requested index.
        index: usize,
        /// Current element count for that kind.
        len: usize,
    },
    /// Buffer growth could not be satisfied.
    AllocationFailure {
        /// Number of slots requested.
        requested: usize,
    },
    /// A buffer was accessed with a primitive type other than the one it was
    /// created with, or a released buffer handle was used.
    TypeMismatch {
        /// What the buffer actually stores.
        expected: &'static str,
        /// What the caller asked for.
        requested: &'static str,
    },
    /// An attribute value could not be applied to its key.
    InvalidAttribute {
        /// Attribute key.
        key: String,
        /// Debug rendering of the rejected value.
        value: String,
    },
}

impl fmt::Display for NuiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { kind, id } => write!(f, "{kind} '{id}' already exists"),
            Self::UnknownId { kind, id } => write!(f, "{kind} '{id}' does not exist"),
            Self::DanglingEndpoint { edge, node } => {
                write!(f, "node '{node}' does not exist, cannot create edge '{edge}'")
            }
            Self::ComponentOutOfRange {
                component,
                components,
            } => write!(
                f,
                "component {component} out of range for a buffer of {components} components"
            ),
            Self::IndexOutOfRange { kind, index, len } => {
                write!(f, "{kind} index {index} out of range (count is {len})")
            }
            Self::AllocationFailure { requested } => {
                write!(f, "cannot allocate buffer storage for {requested} slots")
            }
            Self::TypeMismatch {
                expected,
                requested,
            } => write!(f, "buffer stores {expected}, accessed as {requested}"),
            Self::InvalidAttribute { key, value } => {
                write!(f, "illegal value for attribute '{key}': {value}")
            }
        }
    }
}

impl Error for NuiError {}

/// Convenience alias for fallible operations in this crate.
pub type Result<T, E = NuiError> = std::result::Result<T, E>;

/// Log a recovered data error and pass the result through.
pub(crate) fn warned<T>(result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        log::warn!("{err}");
    }
    result
}

/// Abort on an internal consistency error.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: NuiError) -> ! {
    log::error!("{err}");
    panic!("{err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = NuiError::DanglingEndpoint {
            edge: "e1".into(),
            node: "z".into(),
        };
        assert_eq!(err.to_string(), "node 'z' does not exist, cannot create edge 'e1'");

        let err = NuiError::DuplicateId {
            kind: ElementKind::Node,
            id: "a".into(),
        };
        assert_eq!(err.to_string(), "node 'a' already exists");
    }

    #[test]
    #[should_panic(expected = "component 3 out of range")]
    fn test_fatal_panics_with_message() {
        fatal(NuiError::ComponentOutOfRange {
            component: 3,
            components: 3,
        });
    }
}
