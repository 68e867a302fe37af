//! The garbage-collected heap: typed arenas, the string interner, and the
//! tri-color mark-and-sweep collector.

use crate::native::NativeRef;
use crate::object::{BoundMethod, Class, Closure, Function, Instance, Upvalue};
use crate::value::Value;
use compact_str::CompactString;
use core::any;
use core::fmt;
use core::hash;
use core::marker;
use core::mem;
use core::num::NonZeroU32;
use std::collections::HashMap;

/// A raw index into an arena, with no associated generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArenaPtr(NonZeroU32);

impl ArenaPtr {
    fn new(index: usize) -> Option<Self> {
        NonZeroU32::new(u32::try_from(index).ok()?).map(ArenaPtr)
    }

    fn to_index(self) -> usize {
        (u32::from(self.0) as usize) - 1
    }
}

/// The generation of an arena slot. Incremented on every free so stale
/// handles fail to resolve instead of aliasing a new object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Generation(u32);

impl Generation {
    const fn increment(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug)]
enum Entry<T> {
    Free {
        generation: Generation,
        next_free: Option<ArenaPtr>,
    },
    Used {
        generation: Generation,
        is_marked: bool,
        size: usize,
        value: T,
    },
}

/// A typed handle into the heap.
pub struct Handle<T> {
    ptr: ArenaPtr,
    generation: Generation,
    _marker: marker::PhantomData<T>,
}

impl<T> Handle<T> {
    const fn from_raw_parts(ptr: ArenaPtr, generation: Generation) -> Self {
        Self {
            ptr,
            generation,
            _marker: marker::PhantomData,
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    #[expect(
        clippy::min_ident_chars,
        reason = "keep consistent with trait definition."
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("ptr", &self.ptr)
            .field("generation", &self.generation)
            .field("type", &any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> hash::Hash for Handle<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.ptr.0.hash(state);
        self.generation.hash(state);
    }
}

/// A generational arena with a free list and per-entry mark flags.
#[derive(Debug)]
struct Arena<T> {
    data: Vec<Entry<T>>,
    free_list: Option<ArenaPtr>,
}

impl<T> Arena<T> {
    const fn new() -> Self {
        Self {
            data: Vec::new(),
            free_list: None,
        }
    }

    fn alloc(&mut self, value: T, size: usize) -> Handle<T> {
        if let Some(handle) = self.next_free() {
            self.data[handle.ptr.to_index()] = Entry::Used {
                generation: handle.generation,
                is_marked: false,
                size,
                value,
            };
            handle
        } else {
            let generation = Generation(0);
            self.data.push(Entry::Used {
                generation,
                is_marked: false,
                size,
                value,
            });
            let ptr = ArenaPtr::new(self.data.len()).expect("ran out of arena capacity.");
            Handle::from_raw_parts(ptr, generation)
        }
    }

    fn next_free(&mut self) -> Option<Handle<T>> {
        let ptr = self.free_list?;
        match self.data[ptr.to_index()] {
            Entry::Free {
                generation,
                next_free,
            } => {
                self.free_list = next_free;
                Some(Handle::from_raw_parts(ptr, generation))
            }
            #[expect(clippy::panic, reason = "no clean way to deal with this.")]
            Entry::Used { .. } => panic!("arena free list is corrupted!"),
        }
    }

    fn get(&self, handle: Handle<T>) -> Option<&T> {
        match self.data.get(handle.ptr.to_index())? {
            &Entry::Used {
                generation,
                ref value,
                ..
            } if generation == handle.generation => Some(value),
            _ => None,
        }
    }

    fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self.data.get_mut(handle.ptr.to_index())? {
            &mut Entry::Used {
                generation,
                ref mut value,
                ..
            } if generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Mark the entry. Returns true if it was white before the call.
    fn mark(&mut self, handle: Handle<T>) -> bool {
        match self.data.get_mut(handle.ptr.to_index()) {
            Some(&mut Entry::Used {
                generation,
                ref mut is_marked,
                ..
            }) if generation == handle.generation => !mem::replace(is_marked, true),
            _ => false,
        }
    }

    fn is_marked(&self, handle: Handle<T>) -> bool {
        matches!(
            self.data.get(handle.ptr.to_index()),
            Some(&Entry::Used {
                generation,
                is_marked: true,
                ..
            }) if generation == handle.generation
        )
    }

    fn clear_marks(&mut self) {
        for entry in &mut self.data {
            if let &mut Entry::Used {
                ref mut is_marked, ..
            } = entry
            {
                *is_marked = false;
            }
        }
    }

    /// Free every unmarked entry, clear the marks of the survivors, and
    /// return the number of bytes released.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for index in 0..self.data.len() {
            match self.data[index] {
                Entry::Used {
                    generation,
                    is_marked: false,
                    size,
                    ..
                } => {
                    freed += size;
                    let ptr = ArenaPtr::new(index + 1).expect("index + 1 is non-zero.");
                    self.data[index] = Entry::Free {
                        generation: generation.increment(),
                        next_free: self.free_list,
                    };
                    self.free_list = Some(ptr);
                }
                Entry::Used {
                    ref mut is_marked, ..
                } => {
                    *is_marked = false;
                }
                Entry::Free { .. } => {}
            }
        }
        freed
    }

    fn live_count(&self) -> usize {
        self.data
            .iter()
            .filter(|entry| matches!(entry, Entry::Used { .. }))
            .count()
    }
}

/// A collaborator that owns references into the heap and can surface them as
/// roots. The VM implements this for its stack, globals, frames, and open
/// upvalues; the compiler marks its in-progress function chain directly.
pub trait MarkRoots {
    /// Mark every root owned by the implementor. Called between
    /// [`Heap::begin_cycle`] and [`Heap::collect`].
    fn mark_roots(&self, heap: &mut Heap);
}

/// An untyped reference to any heap object, used for the grey worklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {
    String(Handle<CompactString>),
    Function(Handle<Function>),
    Closure(Handle<Closure>),
    Upvalue(Handle<Upvalue>),
    Native(Handle<NativeRef>),
    Class(Handle<Class>),
    Instance(Handle<Instance>),
    BoundMethod(Handle<BoundMethod>),
}

/// The garbage-collected heap.
///
/// Owns one arena per object kind, the weak string interner, and the
/// allocation accounting that drives collection. Collection itself is split
/// between the heap and its collaborators: the VM and compiler decide *when*
/// (via [`Heap::should_collect`]) and seed the roots (via
/// [`Heap::mark_value`] after [`Heap::begin_cycle`]); the heap traces,
/// prunes the interner, and sweeps in [`Heap::collect`].
#[derive(Debug)]
pub struct Heap {
    strings: Arena<CompactString>,
    functions: Arena<Function>,
    closures: Arena<Closure>,
    upvalues: Arena<Upvalue>,
    natives: Arena<NativeRef>,
    classes: Arena<Class>,
    instances: Arena<Instance>,
    bound_methods: Arena<BoundMethod>,
    /// Weak map from string content to its canonical heap object. Entries
    /// whose object is unmarked are dropped before every sweep.
    interner: HashMap<CompactString, Handle<CompactString>>,
    grey: Vec<Object>,
    bytes_allocated: usize,
    next_gc: usize,
    stress: bool,
}

/// The threshold that triggers the first collection.
const FIRST_GC_THRESHOLD: usize = 1024 * 1024;

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// Create an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strings: Arena::new(),
            functions: Arena::new(),
            closures: Arena::new(),
            upvalues: Arena::new(),
            natives: Arena::new(),
            classes: Arena::new(),
            instances: Arena::new(),
            bound_methods: Arena::new(),
            interner: HashMap::new(),
            grey: Vec::new(),
            bytes_allocated: 0,
            next_gc: FIRST_GC_THRESHOLD,
            stress: false,
        }
    }

    /// Create a heap whose every collection check fires. Exercises the
    /// collector on each allocation boundary.
    #[must_use]
    pub fn with_stress(stress: bool) -> Self {
        Self {
            stress,
            ..Self::new()
        }
    }

    /// Total bytes of live objects.
    #[must_use]
    pub const fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Number of live objects across all arenas.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.strings.live_count()
            + self.functions.live_count()
            + self.closures.live_count()
            + self.upvalues.live_count()
            + self.natives.live_count()
            + self.classes.live_count()
            + self.instances.live_count()
            + self.bound_methods.live_count()
    }

    fn record_allocation(&mut self, size: usize) {
        self.bytes_allocated += size;
    }
}

impl Heap {
    /// Return the canonical string object for the given content.
    pub fn intern(&mut self, text: &str) -> Handle<CompactString> {
        if let Some(&handle) = self.interner.get(text) {
            return handle;
        }
        let content = CompactString::from(text);
        self.intern_owned(content)
    }

    /// Return the canonical string object, consuming the content.
    pub fn intern_owned(&mut self, content: CompactString) -> Handle<CompactString> {
        if let Some(&handle) = self.interner.get(content.as_str()) {
            return handle;
        }
        let size = mem::size_of::<CompactString>() + content.len();
        let handle = self.strings.alloc(content.clone(), size);
        self.record_allocation(size);
        self.interner.insert(content, handle);
        handle
    }

    pub fn make_function(&mut self, function: Function) -> Handle<Function> {
        let size = mem::size_of::<Function>();
        self.record_allocation(size);
        self.functions.alloc(function, size)
    }

    pub fn make_closure(&mut self, closure: Closure) -> Handle<Closure> {
        let size = mem::size_of::<Closure>();
        self.record_allocation(size);
        self.closures.alloc(closure, size)
    }

    pub fn make_upvalue(&mut self, upvalue: Upvalue) -> Handle<Upvalue> {
        let size = mem::size_of::<Upvalue>();
        self.record_allocation(size);
        self.upvalues.alloc(upvalue, size)
    }

    pub fn make_native(&mut self, native: NativeRef) -> Handle<NativeRef> {
        let size = mem::size_of::<NativeRef>();
        self.record_allocation(size);
        self.natives.alloc(native, size)
    }

    pub fn make_class(&mut self, class: Class) -> Handle<Class> {
        let size = mem::size_of::<Class>();
        self.record_allocation(size);
        self.classes.alloc(class, size)
    }

    pub fn make_instance(&mut self, instance: Instance) -> Handle<Instance> {
        let size = mem::size_of::<Instance>();
        self.record_allocation(size);
        self.instances.alloc(instance, size)
    }

    pub fn make_bound_method(&mut self, bound: BoundMethod) -> Handle<BoundMethod> {
        let size = mem::size_of::<BoundMethod>();
        self.record_allocation(size);
        self.bound_methods.alloc(bound, size)
    }

    #[must_use]
    pub fn string(&self, handle: Handle<CompactString>) -> Option<&str> {
        self.strings.get(handle).map(CompactString::as_str)
    }

    #[must_use]
    pub fn function(&self, handle: Handle<Function>) -> Option<&Function> {
        self.functions.get(handle)
    }

    pub fn function_mut(&mut self, handle: Handle<Function>) -> Option<&mut Function> {
        self.functions.get_mut(handle)
    }

    #[must_use]
    pub fn closure(&self, handle: Handle<Closure>) -> Option<&Closure> {
        self.closures.get(handle)
    }

    #[must_use]
    pub fn upvalue(&self, handle: Handle<Upvalue>) -> Option<&Upvalue> {
        self.upvalues.get(handle)
    }

    pub fn upvalue_mut(&mut self, handle: Handle<Upvalue>) -> Option<&mut Upvalue> {
        self.upvalues.get_mut(handle)
    }

    /// A clone of the shared native callable, so callers can invoke it while
    /// handing the heap back to it.
    #[must_use]
    pub fn native(&self, handle: Handle<NativeRef>) -> Option<NativeRef> {
        self.natives.get(handle).cloned()
    }

    #[must_use]
    pub fn class(&self, handle: Handle<Class>) -> Option<&Class> {
        self.classes.get(handle)
    }

    pub fn class_mut(&mut self, handle: Handle<Class>) -> Option<&mut Class> {
        self.classes.get_mut(handle)
    }

    #[must_use]
    pub fn instance(&self, handle: Handle<Instance>) -> Option<&Instance> {
        self.instances.get(handle)
    }

    pub fn instance_mut(&mut self, handle: Handle<Instance>) -> Option<&mut Instance> {
        self.instances.get_mut(handle)
    }

    #[must_use]
    pub fn bound_method(&self, handle: Handle<BoundMethod>) -> Option<&BoundMethod> {
        self.bound_methods.get(handle)
    }
}

impl Heap {
    /// Whether a collection cycle is due.
    #[must_use]
    pub const fn should_collect(&self) -> bool {
        self.stress || self.bytes_allocated > self.next_gc
    }

    /// Reset every mark to white and empty the grey worklist. Roots must be
    /// marked between this call and [`Heap::collect`].
    pub fn begin_cycle(&mut self) {
        self.strings.clear_marks();
        self.functions.clear_marks();
        self.closures.clear_marks();
        self.upvalues.clear_marks();
        self.natives.clear_marks();
        self.classes.clear_marks();
        self.instances.clear_marks();
        self.bound_methods.clear_marks();
        self.grey.clear();
    }

    /// Mark the object behind a value, if any, queueing it grey when it was
    /// white.
    pub fn mark_value(&mut self, value: Value) {
        if let Some(object) = value.object() {
            self.mark_object(object);
        }
    }

    /// Mark an object, queueing it grey when it was white.
    pub fn mark_object(&mut self, object: Object) {
        let newly_marked = match object {
            Object::String(handle) => self.strings.mark(handle),
            Object::Function(handle) => self.functions.mark(handle),
            Object::Closure(handle) => self.closures.mark(handle),
            Object::Upvalue(handle) => self.upvalues.mark(handle),
            Object::Native(handle) => self.natives.mark(handle),
            Object::Class(handle) => self.classes.mark(handle),
            Object::Instance(handle) => self.instances.mark(handle),
            Object::BoundMethod(handle) => self.bound_methods.mark(handle),
        };
        if newly_marked {
            self.grey.push(object);
        }
    }

    /// Trace the grey worklist to a fixpoint, prune dead interner entries,
    /// sweep every arena, and grow the threshold. Returns the freed bytes.
    pub fn collect(&mut self) -> usize {
        while let Some(object) = self.grey.pop() {
            self.blacken(object);
        }

        // The interner must not keep strings alive: drop entries for
        // unreached strings before the sweep frees them.
        let strings = &self.strings;
        self.interner
            .retain(|_, handle| strings.is_marked(*handle));

        let mut freed = 0;
        freed += self.strings.sweep();
        freed += self.functions.sweep();
        freed += self.closures.sweep();
        freed += self.upvalues.sweep();
        freed += self.natives.sweep();
        freed += self.classes.sweep();
        freed += self.instances.sweep();
        freed += self.bound_methods.sweep();

        self.bytes_allocated -= freed;
        self.next_gc = self.bytes_allocated * 2;
        tracing::debug!(
            freed,
            live_bytes = self.bytes_allocated,
            next_gc = self.next_gc,
            "collection cycle finished"
        );
        freed
    }

    /// Mark the direct references of a grey object.
    fn blacken(&mut self, object: Object) {
        match object {
            Object::String(_) | Object::Native(_) => {}
            Object::Function(handle) => {
                let (name, constant_count) = match self.functions.get(handle) {
                    Some(function) => (function.name, function.chunk.constants().len()),
                    None => return,
                };
                self.mark_object(Object::String(name));
                for index in 0..constant_count {
                    let Some(function) = self.functions.get(handle) else {
                        return;
                    };
                    let constant = function.chunk.constants()[index];
                    self.mark_value(constant);
                }
            }
            Object::Upvalue(handle) => {
                if let Some(&Upvalue::Closed { value }) = self.upvalues.get(handle) {
                    self.mark_value(value);
                }
            }
            Object::Closure(handle) => {
                let (function, upvalues) = match self.closures.get(handle) {
                    Some(closure) => (closure.function, closure.upvalues.clone()),
                    None => return,
                };
                self.mark_object(Object::Function(function));
                for upvalue in upvalues {
                    self.mark_object(Object::Upvalue(upvalue));
                }
            }
            Object::Class(handle) => {
                let (name, methods) = match self.classes.get(handle) {
                    Some(class) => (
                        class.name,
                        class
                            .methods
                            .iter()
                            .map(|(&name, &method)| (name, method))
                            .collect::<Vec<_>>(),
                    ),
                    None => return,
                };
                self.mark_object(Object::String(name));
                for (method_name, method) in methods {
                    self.mark_object(Object::String(method_name));
                    self.mark_object(Object::Closure(method));
                }
            }
            Object::Instance(handle) => {
                let (class, fields) = match self.instances.get(handle) {
                    Some(instance) => (
                        instance.class,
                        instance
                            .fields
                            .iter()
                            .map(|(&name, &value)| (name, value))
                            .collect::<Vec<_>>(),
                    ),
                    None => return,
                };
                self.mark_object(Object::Class(class));
                for (field_name, value) in fields {
                    self.mark_object(Object::String(field_name));
                    self.mark_value(value);
                }
            }
            Object::BoundMethod(handle) => {
                if let Some(&BoundMethod { receiver, method }) = self.bound_methods.get(handle) {
                    self.mark_object(Object::Instance(receiver));
                    self.mark_object(Object::Closure(method));
                }
            }
        }
    }
}

impl Heap {
    /// Write a one-line-per-arena summary of live objects into the buffer.
    ///
    /// # Errors
    /// This function will error if it can not write into the buffer.
    pub fn dump(&self, buffer: &mut impl fmt::Write) -> Result<(), fmt::Error> {
        writeln!(
            buffer,
            "heap: {} bytes live, next collection at {}",
            self.bytes_allocated, self.next_gc
        )?;
        writeln!(buffer, "  strings:       {}", self.strings.live_count())?;
        writeln!(buffer, "  functions:     {}", self.functions.live_count())?;
        writeln!(buffer, "  closures:      {}", self.closures.live_count())?;
        writeln!(buffer, "  upvalues:      {}", self.upvalues.live_count())?;
        writeln!(buffer, "  natives:       {}", self.natives.live_count())?;
        writeln!(buffer, "  classes:       {}", self.classes.live_count())?;
        writeln!(buffer, "  instances:     {}", self.instances.live_count())?;
        writeln!(buffer, "  bound methods: {}", self.bound_methods.live_count())
    }
}

#[cfg(test)]
mod test {
    use super::Heap;
    use crate::object::{Closure, Function, Upvalue};
    use crate::value::Value;

    #[test]
    fn interning_returns_identical_handles() {
        let mut heap = Heap::new();
        let first = heap.intern("hello");
        let second = heap.intern("hello");
        let other = heap.intern("world");
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(heap.string(first), Some("hello"));
    }

    #[test]
    fn collect_frees_unreached_objects() {
        let mut heap = Heap::new();
        let kept = heap.intern("kept");
        let _dropped = heap.intern("dropped");
        let before = heap.bytes_allocated();

        heap.begin_cycle();
        heap.mark_value(Value::String(kept));
        let freed = heap.collect();

        assert!(freed > 0);
        assert_eq!(heap.bytes_allocated(), before - freed);
        assert_eq!(heap.live_objects(), 1);
        assert_eq!(heap.string(kept), Some("kept"));
    }

    #[test]
    fn interner_entries_are_weak() {
        let mut heap = Heap::new();
        let stale = heap.intern("transient");

        heap.begin_cycle();
        heap.collect();

        // The old handle is dead and re-interning builds a fresh object.
        assert_eq!(heap.string(stale), None);
        let fresh = heap.intern("transient");
        assert_ne!(stale, fresh);
        assert_eq!(heap.string(fresh), Some("transient"));
    }

    #[test]
    fn tracing_follows_closure_references() {
        let mut heap = Heap::new();
        let name = heap.intern("f");
        let captured = heap.intern("captured");
        let upvalue = heap.make_upvalue(Upvalue::Closed {
            value: Value::String(captured),
        });
        let function = heap.make_function(Function {
            name,
            arity: 0,
            upvalues: Vec::new(),
            chunk: crate::chunk::Chunk::new(),
        });
        let closure = heap.make_closure(Closure {
            function,
            upvalues: vec![upvalue],
        });

        heap.begin_cycle();
        heap.mark_value(Value::Closure(closure));
        heap.collect();

        // Everything hangs off the closure root and survives.
        assert_eq!(heap.live_objects(), 5);
        assert_eq!(heap.string(captured), Some("captured"));
    }

    #[test]
    fn sweep_updates_threshold() {
        let mut heap = Heap::new();
        heap.intern("a");
        heap.begin_cycle();
        heap.collect();
        assert_eq!(heap.bytes_allocated(), 0);
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn freed_slots_are_reused_with_new_generations() {
        let mut heap = Heap::new();
        let first = heap.intern("one");
        heap.begin_cycle();
        heap.collect();
        let second = heap.intern("two");
        // Slot reuse must not let the stale handle resolve.
        assert_eq!(heap.string(first), None);
        assert_eq!(heap.string(second), Some("two"));
    }
}
