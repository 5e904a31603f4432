//! BufferSwapper - typed per-element arrays kept in lockstep with the
//! index registry.
//!
//! Each registered buffer mirrors one element kind. Registry events are
//! replayed through [`BufferSwapper::apply`]:
//!
//! - `Added`: every buffer of the kind is grown first if the count reached
//!   its capacity, then every buffer initializes the new slot. Because all
//!   resizes precede all initializations, an initializer may read the other
//!   buffers at the new index.
//! - `Swapped { from, to }`: the slot at `from` is copied into `to`.
//! - `Removed`: the trailing slot is dropped and the storage may shrink.
//! - `Cleared`: every buffer drops back to its creation capacity.
//!
//! Handles never expose storage across a mutation: `direct` and
//! `direct_mut` borrow the swapper, so the borrow checker ends them before
//! the next event is applied.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::handle::{ArrayRef, BufferId, BufferRef, Primitive, PrimitiveType};
use super::storage::{Initializer, ObjectStorage, PrimitiveStorage, Swappable};
use crate::error::{NuiError, fatal};
use crate::graph::{ElementIndex, ElementKind, IndexEvent, IndexRegistry};

/// Capacity policy of one buffer, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sizing {
    /// Capacity at creation, and the floor when shrinking.
    pub initial_size: usize,
    /// Slots added on each growth.
    pub grow_step: usize,
}

impl Sizing {
    /// Create a sizing policy.
    pub const fn new(initial_size: usize, grow_step: usize) -> Self {
        Self {
            initial_size,
            grow_step,
        }
    }
}

/// Default sizing for each element kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapperConfig {
    /// Node buffers.
    pub node: Sizing,
    /// Edge buffers.
    pub edge: Sizing,
    /// Sprite buffers.
    pub sprite: Sizing,
}

impl Default for SwapperConfig {
    fn default() -> Self {
        Self {
            node: Sizing::new(1000, 1000),
            edge: Sizing::new(2000, 2000),
            sprite: Sizing::new(100, 100),
        }
    }
}

impl SwapperConfig {
    /// Sizing used by [`BufferSwapper::create_buffer`] for `kind`.
    pub fn sizing(&self, kind: ElementKind) -> Sizing {
        match kind {
            ElementKind::Node => self.node,
            ElementKind::Edge => self.edge,
            ElementKind::Sprite => self.sprite,
        }
    }
}

pub(crate) struct Entry {
    kind: ElementKind,
    sizing: Sizing,
    storage: Box<dyn Swappable>,
}

impl Entry {
    fn resize(&mut self, capacity: usize) {
        log::debug!(
            "reallocating {} buffer of {} from {} to {} slots",
            self.kind,
            self.storage.type_name(),
            self.storage.capacity(),
            capacity
        );
        if let Err(err) = self.storage.reallocate(capacity) {
            fatal(err);
        }
    }
}

/// What an initializer sees while filling a new slot.
pub struct InitContext<'a> {
    kind: ElementKind,
    index: usize,
    registry: &'a IndexRegistry,
    slots: &'a [Option<Entry>],
}

impl<'a> InitContext<'a> {
    /// Kind of the new element.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Dense index of the new element.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The new element, with its id.
    pub fn element(&self) -> Option<ElementIndex<'a>> {
        self.registry.element(self.kind, self.index as u32)
    }

    /// Read another primitive buffer at the new index.
    ///
    /// Buffers already initialized for this slot return their value, the
    /// others return zero. `None` for the buffer being initialized, for a
    /// buffer of another kind, or for a type mismatch.
    pub fn get<P: Primitive>(&self, buffer: BufferRef, component: usize) -> Option<P> {
        check_component(component, buffer.components);
        let entry = self.slots.get(buffer.id.0 as usize)?.as_ref()?;
        if entry.kind != self.kind {
            return None;
        }
        let storage = entry.storage.as_any().downcast_ref::<PrimitiveStorage>()?;
        storage
            .slice::<P>()?
            .get(self.index * buffer.components + component)
            .copied()
    }

    /// Read another object array at the new index, if already initialized.
    pub fn object<T: Send + 'static>(&self, array: ArrayRef<T>, component: usize) -> Option<&'a T> {
        check_component(component, array.components);
        let entry = self.slots.get(array.id.0 as usize)?.as_ref()?;
        if entry.kind != self.kind {
            return None;
        }
        entry
            .storage
            .as_any()
            .downcast_ref::<ObjectStorage<T>>()?
            .values()
            .get(self.index * array.components + component)
    }
}

fn check_component(component: usize, components: usize) {
    if component >= components {
        fatal(NuiError::ComponentOutOfRange {
            component,
            components,
        });
    }
}

/// Owner of every per-element buffer.
pub struct BufferSwapper {
    config: SwapperConfig,
    lens: [usize; ElementKind::COUNT],
    slots: Vec<Option<Entry>>,
}

impl fmt::Debug for BufferSwapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSwapper")
            .field("config", &self.config)
            .field("lens", &self.lens)
            .field("buffers", &self.slots.iter().flatten().count())
            .finish()
    }
}

impl Default for BufferSwapper {
    fn default() -> Self {
        Self::new(SwapperConfig::default())
    }
}

impl BufferSwapper {
    /// Create a swapper with no buffers.
    pub fn new(config: SwapperConfig) -> Self {
        Self {
            config,
            lens: [0; ElementKind::COUNT],
            slots: Vec::new(),
        }
    }

    /// Sizing defaults.
    pub fn config(&self) -> &SwapperConfig {
        &self.config
    }

    /// Logical length of every buffer of `kind`.
    pub fn len(&self, kind: ElementKind) -> usize {
        self.lens[kind.slot()]
    }

    /// Whether no element of `kind` exists.
    pub fn is_empty(&self, kind: ElementKind) -> bool {
        self.len(kind) == 0
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Create a primitive buffer with the kind's default sizing.
    ///
    /// Existing elements are initialized immediately.
    pub fn create_buffer(
        &mut self,
        registry: &IndexRegistry,
        kind: ElementKind,
        components: usize,
        primitive: PrimitiveType,
        initializer: Option<Initializer>,
    ) -> BufferRef {
        let sizing = self.config.sizing(kind);
        self.create_buffer_sized(registry, kind, components, primitive, sizing, initializer)
    }

    /// Create a primitive buffer with explicit sizing.
    pub fn create_buffer_sized(
        &mut self,
        registry: &IndexRegistry,
        kind: ElementKind,
        components: usize,
        primitive: PrimitiveType,
        sizing: Sizing,
        initializer: Option<Initializer>,
    ) -> BufferRef {
        check_component(0, components);
        let storage = PrimitiveStorage::new(primitive, components, initializer);
        let id = self.register(registry, kind, sizing, Box::new(storage));
        BufferRef {
            id,
            kind,
            components,
            primitive,
        }
    }

    /// Create an object array with the kind's default sizing.
    pub fn create_array<T, F>(
        &mut self,
        registry: &IndexRegistry,
        kind: ElementKind,
        components: usize,
        factory: F,
    ) -> ArrayRef<T>
    where
        T: Send + 'static,
        F: Fn(&InitContext<'_>, usize) -> T + Send + 'static,
    {
        let sizing = self.config.sizing(kind);
        self.create_array_sized(registry, kind, components, sizing, factory)
    }

    /// Create an object array with explicit sizing.
    pub fn create_array_sized<T, F>(
        &mut self,
        registry: &IndexRegistry,
        kind: ElementKind,
        components: usize,
        sizing: Sizing,
        factory: F,
    ) -> ArrayRef<T>
    where
        T: Send + 'static,
        F: Fn(&InitContext<'_>, usize) -> T + Send + 'static,
    {
        check_component(0, components);
        let storage = ObjectStorage::new(components, Box::new(factory));
        let id = self.register(registry, kind, sizing, Box::new(storage));
        ArrayRef::new(id, kind, components)
    }

    fn register(
        &mut self,
        registry: &IndexRegistry,
        kind: ElementKind,
        sizing: Sizing,
        storage: Box<dyn Swappable>,
    ) -> BufferId {
        let len = self.lens[kind.slot()];
        let mut entry = Entry {
            kind,
            sizing,
            storage,
        };
        entry.resize(sizing.initial_size.max(len + sizing.grow_step));
        for index in 0..len {
            let ctx = InitContext {
                kind,
                index,
                registry,
                slots: &self.slots,
            };
            entry.storage.init_slot(&ctx);
        }

        let id = BufferId(self.slots.len() as u32);
        self.slots.push(Some(entry));
        id
    }

    /// Unregister a buffer. Returns `false` if it was already released.
    pub fn release(&mut self, handle: impl Into<BufferId>) -> bool {
        let id = handle.into();
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .is_some()
    }

    /// Allocated slots of a buffer.
    pub fn capacity(&self, handle: impl Into<BufferId>) -> usize {
        self.entry(handle.into()).storage.capacity()
    }

    // =========================================================================
    // Access
    // =========================================================================

    fn entry(&self, id: BufferId) -> &Entry {
        match self.slots.get(id.0 as usize).and_then(Option::as_ref) {
            Some(entry) => entry,
            None => fatal(released()),
        }
    }

    fn entry_mut(&mut self, id: BufferId) -> &mut Entry {
        match self.slots.get_mut(id.0 as usize).and_then(Option::as_mut) {
            Some(entry) => entry,
            None => fatal(released()),
        }
    }

    fn offset(&self, kind: ElementKind, components: usize, index: usize, component: usize) -> usize {
        check_component(component, components);
        let len = self.lens[kind.slot()];
        if index >= len {
            fatal(NuiError::IndexOutOfRange { kind, index, len });
        }
        index * components + component
    }

    /// Read one component of one element.
    pub fn get<P: Primitive>(&self, buffer: BufferRef, index: usize, component: usize) -> P {
        let at = self.offset(buffer.kind, buffer.components, index, component);
        self.direct::<P>(buffer)[at]
    }

    /// Write one component of one element.
    pub fn set<P: Primitive>(&mut self, buffer: BufferRef, index: usize, component: usize, value: P) {
        let at = self.offset(buffer.kind, buffer.components, index, component);
        self.direct_mut::<P>(buffer)[at] = value;
    }

    /// The live `len * components` values, element-major.
    pub fn direct<P: Primitive>(&self, buffer: BufferRef) -> &[P] {
        let len = self.lens[buffer.kind.slot()] * buffer.components;
        let storage = primitive(self.entry(buffer.id));
        match storage.slice::<P>() {
            Some(values) => &values[..len],
            None => fatal(mismatch(storage.primitive().name(), P::TYPE.name())),
        }
    }

    /// Mutable view of the live values.
    pub fn direct_mut<P: Primitive>(&mut self, buffer: BufferRef) -> &mut [P] {
        let len = self.lens[buffer.kind.slot()] * buffer.components;
        let storage = primitive_mut(self.entry_mut(buffer.id));
        let stored = storage.primitive().name();
        match storage.slice_mut::<P>() {
            Some(values) => &mut values[..len],
            None => fatal(mismatch(stored, P::TYPE.name())),
        }
    }

    /// Read one component of one element of an object array.
    pub fn get_object<T: Send + 'static>(&self, array: ArrayRef<T>, index: usize, component: usize) -> &T {
        let at = self.offset(array.kind, array.components, index, component);
        &self.objects(array)[at]
    }

    /// Replace one component of one element of an object array.
    pub fn set_object<T: Send + 'static>(
        &mut self,
        array: ArrayRef<T>,
        index: usize,
        component: usize,
        value: T,
    ) {
        let at = self.offset(array.kind, array.components, index, component);
        self.objects_mut(array)[at] = value;
    }

    /// The live values of an object array, element-major.
    pub fn objects<T: Send + 'static>(&self, array: ArrayRef<T>) -> &[T] {
        match self
            .entry(array.id)
            .storage
            .as_any()
            .downcast_ref::<ObjectStorage<T>>()
        {
            Some(storage) => storage.values(),
            None => fatal(mismatch("another type", std::any::type_name::<T>())),
        }
    }

    /// Mutable view of an object array.
    pub fn objects_mut<T: Send + 'static>(&mut self, array: ArrayRef<T>) -> &mut [T] {
        match self
            .entry_mut(array.id)
            .storage
            .as_any_mut()
            .downcast_mut::<ObjectStorage<T>>()
        {
            Some(storage) => storage.values_mut(),
            None => fatal(mismatch("another type", std::any::type_name::<T>())),
        }
    }

    // =========================================================================
    // Registry events
    // =========================================================================

    /// Replay one registry event on every buffer.
    pub fn apply(&mut self, event: &IndexEvent, registry: &IndexRegistry) {
        match *event {
            IndexEvent::Added { kind, index } => self.on_added(kind, index as usize, registry),
            IndexEvent::Swapped { kind, from, to } => {
                for entry in self.entries_mut(kind) {
                    entry.storage.copy_slot(from as usize, to as usize);
                }
            }
            IndexEvent::Removed { kind, index } => self.on_removed(kind, index as usize),
            IndexEvent::Cleared => self.on_cleared(),
        }
    }

    fn entries_mut(&mut self, kind: ElementKind) -> impl Iterator<Item = &mut Entry> {
        self.slots
            .iter_mut()
            .flatten()
            .filter(move |entry| entry.kind == kind)
    }

    fn on_added(&mut self, kind: ElementKind, index: usize, registry: &IndexRegistry) {
        let count = index + 1;
        debug_assert_eq!(index, self.lens[kind.slot()], "{kind} slot added out of order");
        self.lens[kind.slot()] = count;

        for entry in self.entries_mut(kind) {
            let capacity = entry.storage.capacity();
            if count >= capacity {
                entry.resize((capacity + entry.sizing.grow_step.max(1)).max(count));
            }
            // The slot may still hold a removed element's values.
            entry.storage.clear_slot(index);
        }

        for position in 0..self.slots.len() {
            let Some(mut entry) = self.slots[position].take_if(|e| e.kind == kind) else {
                continue;
            };
            let ctx = InitContext {
                kind,
                index,
                registry,
                slots: &self.slots,
            };
            entry.storage.init_slot(&ctx);
            self.slots[position] = Some(entry);
        }
    }

    fn on_removed(&mut self, kind: ElementKind, index: usize) {
        let count = index;
        self.lens[kind.slot()] = count;

        for entry in self.entries_mut(kind) {
            entry.storage.truncate(count);
            let capacity = entry.storage.capacity();
            let step = entry.sizing.grow_step;
            if count < capacity / 2 && count + step < capacity / 4 {
                let shrunk = (count + step).max(entry.sizing.initial_size);
                if shrunk < capacity {
                    entry.resize(shrunk);
                }
            }
        }
    }

    fn on_cleared(&mut self) {
        self.lens = [0; ElementKind::COUNT];
        for entry in self.slots.iter_mut().flatten() {
            entry.storage.truncate(0);
            let capacity = entry.sizing.initial_size.max(entry.sizing.grow_step);
            if capacity != entry.storage.capacity() {
                entry.resize(capacity);
            }
        }
    }
}

fn primitive(entry: &Entry) -> &PrimitiveStorage {
    match entry.storage.as_any().downcast_ref::<PrimitiveStorage>() {
        Some(storage) => storage,
        None => fatal(mismatch(entry.storage.type_name(), "a primitive")),
    }
}

fn primitive_mut(entry: &mut Entry) -> &mut PrimitiveStorage {
    let stored = entry.storage.type_name();
    match entry.storage.as_any_mut().downcast_mut::<PrimitiveStorage>() {
        Some(storage) => storage,
        None => fatal(mismatch(stored, "a primitive")),
    }
}

fn mismatch(expected: &'static str, requested: &'static str) -> NuiError {
    NuiError::TypeMismatch {
        expected,
        requested,
    }
}

fn released() -> NuiError {
    mismatch("nothing (released)", "a live buffer")
}
