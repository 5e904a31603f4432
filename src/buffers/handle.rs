//! Buffer handles and primitive element types.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::storage::PrimitiveData;
use crate::graph::ElementKind;

/// Primitive element types a [`BufferRef`] can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    /// `u8`
    Byte,
    /// `i32`
    Int,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
}

impl PrimitiveType {
    /// Rust name of the stored type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Byte => "u8",
            Self::Int => "i32",
            Self::Long => "i64",
            Self::Float => "f32",
            Self::Double => "f64",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A type storable in a primitive buffer.
///
/// Implemented for `u8`, `i32`, `i64`, `f32` and `f64` only.
pub trait Primitive: Copy + Default + PartialEq + fmt::Debug + Send + 'static + sealed::Sealed {
    /// Tag of this type.
    const TYPE: PrimitiveType;

    /// Convert an initializer value.
    fn from_f64(value: f64) -> Self;

    #[doc(hidden)]
    fn slice(data: &PrimitiveData) -> Option<&[Self]>;

    #[doc(hidden)]
    fn slice_mut(data: &mut PrimitiveData) -> Option<&mut [Self]>;
}

macro_rules! impl_primitive {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl Primitive for $ty {
            const TYPE: PrimitiveType = PrimitiveType::$variant;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            fn slice(data: &PrimitiveData) -> Option<&[Self]> {
                match data {
                    PrimitiveData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            #[inline]
            fn slice_mut(data: &mut PrimitiveData) -> Option<&mut [Self]> {
                match data {
                    PrimitiveData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_primitive!(u8, Byte);
impl_primitive!(i32, Int);
impl_primitive!(i64, Long);
impl_primitive!(f32, Float);
impl_primitive!(f64, Double);

/// Registration slot of a buffer inside its swapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Handle to a primitive buffer.
///
/// Cheap to copy and valid until released; it never points at storage
/// directly, so it survives every reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRef {
    pub(crate) id: BufferId,
    pub(crate) kind: ElementKind,
    pub(crate) components: usize,
    pub(crate) primitive: PrimitiveType,
}

impl BufferRef {
    /// Element kind the buffer mirrors.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Components per element.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Stored primitive type.
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }
}

/// Handle to an object array of `T`.
pub struct ArrayRef<T> {
    pub(crate) id: BufferId,
    pub(crate) kind: ElementKind,
    pub(crate) components: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArrayRef<T> {
    pub(crate) fn new(id: BufferId, kind: ElementKind, components: usize) -> Self {
        Self {
            id,
            kind,
            components,
            _marker: PhantomData,
        }
    }

    /// Element kind the array mirrors.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Components per element.
    pub fn components(&self) -> usize {
        self.components
    }
}

impl<T> Clone for ArrayRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArrayRef<T> {}

impl<T> fmt::Debug for ArrayRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("components", &self.components)
            .finish()
    }
}

impl<T> PartialEq for ArrayRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ArrayRef<T> {}

impl From<BufferRef> for BufferId {
    fn from(handle: BufferRef) -> Self {
        handle.id
    }
}

impl<T> From<ArrayRef<T>> for BufferId {
    fn from(handle: ArrayRef<T>) -> Self {
        handle.id
    }
}
