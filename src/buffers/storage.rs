//! Concrete storage representations behind the swapper.

use std::any::Any;

use super::handle::{Primitive, PrimitiveType};
use super::swapper::InitContext;
use crate::error::{NuiError, Result};

/// Default value source for a primitive buffer; called once per component
/// of every new slot. The value is cast to the buffer's primitive type.
pub type Initializer = Box<dyn Fn(&InitContext<'_>, usize) -> f64 + Send>;

/// Default value source for an object array; called once per component of
/// every new slot.
pub type ValueFactory<T> = Box<dyn Fn(&InitContext<'_>, usize) -> T + Send>;

/// The operations the swapper needs from every storage, whatever it holds.
pub(crate) trait Swappable: Send {
    /// Name of the stored element type.
    fn type_name(&self) -> &'static str;

    /// Allocated slots.
    fn capacity(&self) -> usize;

    /// Grow or shrink to exactly `capacity` slots, keeping the leading ones.
    fn reallocate(&mut self, capacity: usize) -> Result<()>;

    /// Overwrite slot `to` with the contents of slot `from`.
    fn copy_slot(&mut self, from: usize, to: usize);

    /// Forget slots at and above `len`.
    fn truncate(&mut self, _len: usize) {}

    /// Reset slot `index` to its empty value, before any initializer of
    /// the new occupant runs.
    fn clear_slot(&mut self, _index: usize) {}

    /// Fill every component of the slot `ctx.index()` with its default.
    fn init_slot(&mut self, ctx: &InitContext<'_>);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Backing vector of a primitive buffer, tagged by element type.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveData {
    Byte(Vec<u8>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            PrimitiveData::Byte($v) => $body,
            PrimitiveData::Int($v) => $body,
            PrimitiveData::Long($v) => $body,
            PrimitiveData::Float($v) => $body,
            PrimitiveData::Double($v) => $body,
        }
    };
}

impl PrimitiveData {
    fn new(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Byte => Self::Byte(Vec::new()),
            PrimitiveType::Int => Self::Int(Vec::new()),
            PrimitiveType::Long => Self::Long(Vec::new()),
            PrimitiveType::Float => Self::Float(Vec::new()),
            PrimitiveType::Double => Self::Double(Vec::new()),
        }
    }

    fn primitive(&self) -> PrimitiveType {
        match self {
            Self::Byte(_) => PrimitiveType::Byte,
            Self::Int(_) => PrimitiveType::Int,
            Self::Long(_) => PrimitiveType::Long,
            Self::Float(_) => PrimitiveType::Float,
            Self::Double(_) => PrimitiveType::Double,
        }
    }

    fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    fn resize(&mut self, len: usize) -> Result<()> {
        each_variant!(self, v => resize_zeroed(v, len))
    }

    fn copy_within(&mut self, from: usize, to: usize, width: usize) {
        each_variant!(self, v => v.copy_within(from..from + width, to))
    }

    fn write(&mut self, at: usize, value: f64) {
        each_variant!(self, v => v[at] = Primitive::from_f64(value))
    }

    fn zero(&mut self, range: std::ops::Range<usize>) {
        each_variant!(self, v => v[range].fill(Default::default()))
    }
}

fn resize_zeroed<P: Copy + Default>(vec: &mut Vec<P>, len: usize) -> Result<()> {
    if len > vec.len() {
        vec.try_reserve_exact(len - vec.len())
            .map_err(|_| NuiError::AllocationFailure { requested: len })?;
        vec.resize(len, P::default());
    } else {
        vec.truncate(len);
        vec.shrink_to_fit();
    }
    Ok(())
}

/// Flat `capacity * components` primitive storage.
///
/// Every allocated slot holds a value: new space is zero-filled, so reading
/// a slot that was resized but not yet initialized is well defined.
pub(crate) struct PrimitiveStorage {
    components: usize,
    data: PrimitiveData,
    initializer: Option<Initializer>,
}

impl PrimitiveStorage {
    pub(crate) fn new(
        primitive: PrimitiveType,
        components: usize,
        initializer: Option<Initializer>,
    ) -> Self {
        Self {
            components,
            data: PrimitiveData::new(primitive),
            initializer,
        }
    }

    pub(crate) fn primitive(&self) -> PrimitiveType {
        self.data.primitive()
    }

    pub(crate) fn slice<P: Primitive>(&self) -> Option<&[P]> {
        P::slice(&self.data)
    }

    pub(crate) fn slice_mut<P: Primitive>(&mut self) -> Option<&mut [P]> {
        P::slice_mut(&mut self.data)
    }
}

impl Swappable for PrimitiveStorage {
    fn type_name(&self) -> &'static str {
        self.primitive().name()
    }

    fn capacity(&self) -> usize {
        self.data.len() / self.components
    }

    fn reallocate(&mut self, capacity: usize) -> Result<()> {
        self.data.resize(capacity * self.components)
    }

    fn copy_slot(&mut self, from: usize, to: usize) {
        let c = self.components;
        self.data.copy_within(from * c, to * c, c);
    }

    fn clear_slot(&mut self, index: usize) {
        let base = index * self.components;
        self.data.zero(base..base + self.components);
    }

    fn init_slot(&mut self, ctx: &InitContext<'_>) {
        let base = ctx.index() * self.components;
        match &self.initializer {
            Some(init) => {
                for component in 0..self.components {
                    self.data.write(base + component, init(ctx, component));
                }
            }
            None => self.data.zero(base..base + self.components),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Object storage holding exactly `len * components` live values.
///
/// Objects have no zero value, so unlike primitive storage the vector only
/// holds initialized slots; `capacity` is the reserved room.
pub(crate) struct ObjectStorage<T> {
    components: usize,
    capacity: usize,
    data: Vec<T>,
    factory: ValueFactory<T>,
}

impl<T: Send + 'static> ObjectStorage<T> {
    pub(crate) fn new(components: usize, factory: ValueFactory<T>) -> Self {
        Self {
            components,
            capacity: 0,
            data: Vec::new(),
            factory,
        }
    }

    pub(crate) fn values(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn values_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Send + 'static> Swappable for ObjectStorage<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn reallocate(&mut self, capacity: usize) -> Result<()> {
        let wanted = capacity * self.components;
        if wanted > self.data.len() {
            self.data
                .try_reserve_exact(wanted - self.data.len())
                .map_err(|_| NuiError::AllocationFailure { requested: capacity })?;
        } else {
            self.data.truncate(wanted);
        }
        self.data.shrink_to(wanted);
        self.capacity = capacity;
        Ok(())
    }

    fn copy_slot(&mut self, from: usize, to: usize) {
        // The source slot is vacated right after, so moving is enough.
        let c = self.components;
        for component in 0..c {
            self.data.swap(from * c + component, to * c + component);
        }
    }

    fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.components);
    }

    fn init_slot(&mut self, ctx: &InitContext<'_>) {
        self.data.truncate(ctx.index() * self.components);
        for component in 0..self.components {
            let value = (self.factory)(ctx, component);
            self.data.push(value);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
