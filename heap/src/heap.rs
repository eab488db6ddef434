//! Arena heap with a stop-the-world mark & sweep collector.
//!
//! Objects live in a slot vector and are addressed by [`ObjRef`] indices, so
//! a reference never dangles into reused memory: a swept slot is only handed
//! out again after every reachable reference to it is gone.
//!
//! The heap is decoupled from the interpreter. Consumers provide a
//! [`RootProvider`] on every allocating call; a collection may run inside
//! that call and treats exactly what the provider reports (plus the values
//! being packed into the new object) as live.

use object::{ObjRef, Object, Value};

// ── Public API types ──────────────────────────────────────────────────

/// Consumers implement this to provide GC roots.
///
/// Called inside allocating calls. The provider must describe the mutator's
/// state as it is at the moment of the call; anything it does not report
/// may be reclaimed.
pub trait RootProvider {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value));
}

impl RootProvider for [Value] {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value)) {
        for &value in self {
            visitor(value);
        }
    }
}

impl<T: RootProvider + ?Sized> RootProvider for &T {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value)) {
        (**self).visit_roots(visitor)
    }
}

/// A provider with no roots, for allocations made before the mutator runs.
pub struct NoRoots;

impl RootProvider for NoRoots {
    fn visit_roots(&self, _visitor: &mut dyn FnMut(Value)) {}
}

// ── Heap settings ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// Live objects allowed before the first collection.
    pub initial_threshold: usize,
    /// After a collection the next threshold is `live * growth_factor`,
    /// but never below `initial_threshold`.
    pub growth_factor: f64,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            initial_threshold: 64 * 1024,
            growth_factor: 2.0,
        }
    }
}

impl HeapSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.initial_threshold == 0 {
            return Err("initial_threshold must be > 0");
        }
        if !(self.growth_factor >= 1.0) {
            return Err("growth_factor must be >= 1.0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageCollectionStats {
    pub collections: usize,
    pub allocated: usize,
    pub freed: usize,
    pub live: usize,
}

// ── Heap ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<Object>>,
    free: Vec<u32>,
    marks: Vec<bool>,
    threshold: usize,
    settings: HeapSettings,
    stats: GarbageCollectionStats,
}

impl Heap {
    /// Panics if `settings` fail [`HeapSettings::validate`].
    pub fn new(settings: HeapSettings) -> Self {
        if let Err(err) = settings.validate() {
            panic!("invalid heap settings: {err}");
        }
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            marks: Vec::new(),
            threshold: settings.initial_threshold,
            settings,
            stats: GarbageCollectionStats::default(),
        }
    }

    #[inline]
    pub fn stats(&self) -> GarbageCollectionStats {
        self.stats
    }

    #[inline]
    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        self.slots.get(r.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        self.slots.get_mut(r.index()).and_then(Option::as_mut)
    }

    pub fn alloc_string(&mut self, roots: &dyn RootProvider, bytes: &[u8]) -> ObjRef {
        self.allocate(roots, &[], Object::Str(bytes.to_vec()))
    }

    pub fn alloc_array(&mut self, roots: &dyn RootProvider, elements: &[Value]) -> ObjRef {
        self.allocate(roots, elements, Object::Array(elements.to_vec()))
    }

    pub fn alloc_sexp(
        &mut self,
        roots: &dyn RootProvider,
        tag: i32,
        fields: &[Value],
    ) -> ObjRef {
        self.allocate(roots, fields, Object::Sexp { tag, fields: fields.to_vec() })
    }

    pub fn alloc_closure(
        &mut self,
        roots: &dyn RootProvider,
        entry: u32,
        captures: &[Value],
    ) -> ObjRef {
        self.allocate(roots, captures, Object::Closure { entry, captures: captures.to_vec() })
    }

    fn allocate(&mut self, roots: &dyn RootProvider, pending: &[Value], object: Object) -> ObjRef {
        if self.stats.live >= self.threshold {
            self.collect(roots, pending);
        }

        self.stats.allocated += 1;
        self.stats.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(object);
                ObjRef(index)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Some(object));
                ObjRef(index)
            }
        }
    }

    /// Run a full collection. `pending` holds values that are not yet stored
    /// anywhere the roots can see but must survive.
    pub fn collect(&mut self, roots: &dyn RootProvider, pending: &[Value]) {
        self.marks.clear();
        self.marks.resize(self.slots.len(), false);

        let mut worklist: Vec<ObjRef> = Vec::new();
        {
            let mut grey = |value: Value| {
                if let Some(r) = value.referent() {
                    worklist.push(r);
                }
            };
            roots.visit_roots(&mut grey);
            pending.visit_roots(&mut grey);
        }

        while let Some(r) = worklist.pop() {
            let Some(mark) = self.marks.get_mut(r.index()) else {
                continue;
            };
            if *mark {
                continue;
            }
            *mark = true;
            if let Some(object) = &self.slots[r.index()] {
                worklist.extend(object.values().iter().filter_map(|v| v.referent()));
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !self.marks[index] {
                *slot = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }

        self.stats.collections += 1;
        self.stats.freed += freed;
        self.stats.live -= freed;
        let grown = (self.stats.live as f64 * self.settings.growth_factor) as usize;
        self.threshold = grown.max(self.settings.initial_threshold);

        log::debug!(
            "gc #{}: freed {} objects, {} live, next at {}",
            self.stats.collections,
            freed,
            self.stats.live,
            self.threshold
        );
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapSettings::default())
    }
}
