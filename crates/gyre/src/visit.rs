//! The traversal engine: dispatch, identity tracking, and the visitor hooks.
//!
//! A [`Visitor`] walks one value at a time in one of two modes. Effect mode
//! (`traverse_for_effect`) runs hooks for their side effects and allocates
//! nothing by default; construct mode (`traverse_and_build`) assembles a new,
//! structurally faithful value from the hooks' results. The split is per
//! call, never inferred from context.
//!
//! Cyclic inputs are safe in both modes. Every top-level call owns a fresh
//! identity table keyed by [`HeapId`]; the first visit of a reference records
//! it before descending, and later visits return the recorded mapping
//! instead of re-descending. In construct mode the default container hooks
//! register an empty placeholder node *before* recursing into children and
//! patch its contents afterwards, so a self-referential slot in the output
//! resolves to the newly built container itself, never to the original or to
//! a half-built value.
//!
//! Traversal is depth-first and recursive: call-stack depth tracks the
//! nesting depth of the input, so pathologically deep (as opposed to cyclic)
//! structures can exhaust the stack.

use ahash::AHashMap;

use crate::heap::{Body, Heap, HeapId, Node, Shape};
use crate::shapes::{Handle, HandleAspect, Mapping, Sequence};
use crate::tracer::{NoopTracer, WalkTracer};
use crate::value::{TypeTag, Value};

/// Per-call traversal mode, fixed by the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Hooks run for their side effects; results bubbling back to the entry
    /// point are discarded.
    Effect,
    /// Hooks produce values that are assembled into a new structure.
    Construct,
}

/// What the identity table knows about a reference seen in this call.
#[derive(Debug, Clone, Copy)]
enum Mapped {
    /// Seen; its traversal has not registered a produced value yet. Acts as
    /// the presence marker in effect mode.
    InProgress,
    /// Mapped to a produced value. Construct mode registers the placeholder
    /// here before descending into children, then overwrites with the final
    /// value.
    Done(Value),
}

/// Per-call traversal state: the heap and tracer borrows, the mode, and the
/// identity table that makes cyclic inputs safe.
///
/// Each entry point builds a fresh `Walk` and drops it on return (including
/// error unwinds), so identity tracking never leaks between top-level calls.
/// Recursive hook calls during one traversal share the same instance.
pub struct Walk<'w> {
    heap: &'w mut Heap,
    tracer: &'w mut dyn WalkTracer,
    mode: Mode,
    seen: AHashMap<HeapId, Mapped>,
}

impl<'w> Walk<'w> {
    fn new(heap: &'w mut Heap, tracer: &'w mut dyn WalkTracer, mode: Mode) -> Self {
        Self { heap, tracer, mode, seen: AHashMap::new() }
    }

    /// The mode fixed by the entry point.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Shared access to the heap under traversal.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Mutable access to the heap. Hooks use this to mutate the original
    /// structure in place and to allocate replacement nodes.
    pub fn heap_mut(&mut self) -> &mut Heap {
        self.heap
    }

    /// The tracer attached to this call.
    pub fn tracer(&mut self) -> &mut dyn WalkTracer {
        self.tracer
    }

    /// Allocates an empty placeholder node and registers it as the produced
    /// value for `source`, so references back to `source` reached while its
    /// children are being built resolve to the new node.
    ///
    /// The default construct-mode container hooks call this before recursing
    /// and patch the placeholder's contents afterwards. Custom hooks that
    /// assemble their own containers should do the same to stay correct on
    /// cyclic inputs.
    pub fn allocate_placeholder(&mut self, source: HeapId, body: Body) -> HeapId {
        let produced = self.heap.allocate(Node::new(body));
        self.seen.insert(source, Mapped::Done(Value::Ref(produced)));
        produced
    }

    /// Applies `tag` to `produced` iff it references an untagged node.
    /// Returns whether the tag was applied.
    pub fn retain_tag(&mut self, tag: TypeTag, produced: Value) -> bool {
        let Value::Ref(id) = produced else { return false };
        if !self.heap.tag_if_untagged(produced, tag) {
            return false;
        }
        self.tracer.on_tag_retained(tag, id);
        true
    }
}

/// A traversal strategy.
///
/// Every hook has a default body implementing pass-through deep copy, so an
/// implementation overrides only what it cares about; overriding one hook
/// never requires overriding another. Hooks recurse by calling
/// [`visit`](Self::visit) on child values, and each default body is also
/// available as a free `walk_*` function so an override can add behavior and
/// then delegate.
///
/// Errors belong to the implementor: the engine never creates, wraps, or
/// converts one. A hook error aborts the whole top-level call and propagates
/// unchanged. Visitors that cannot fail use
/// [`Infallible`](core::convert::Infallible).
pub trait Visitor: Sized {
    type Error;

    /// Traverses `value` for side effects only.
    fn traverse_for_effect(&mut self, heap: &mut Heap, value: Value) -> Result<(), Self::Error> {
        let mut tracer = NoopTracer;
        self.traverse_for_effect_with_tracer(heap, value, &mut tracer)
    }

    /// Like [`traverse_for_effect`](Self::traverse_for_effect), reporting
    /// events to `tracer`.
    fn traverse_for_effect_with_tracer(
        &mut self,
        heap: &mut Heap,
        value: Value,
        tracer: &mut dyn WalkTracer,
    ) -> Result<(), Self::Error> {
        let mut walk = Walk::new(heap, tracer, Mode::Effect);
        self.visit(&mut walk, value)?;
        Ok(())
    }

    /// Traverses `value` and returns a new, structurally faithful value
    /// built from the hooks' results, allocated into the same heap.
    fn traverse_and_build(&mut self, heap: &mut Heap, value: Value) -> Result<Value, Self::Error> {
        let mut tracer = NoopTracer;
        self.traverse_and_build_with_tracer(heap, value, &mut tracer)
    }

    /// Like [`traverse_and_build`](Self::traverse_and_build), reporting
    /// events to `tracer`.
    fn traverse_and_build_with_tracer(
        &mut self,
        heap: &mut Heap,
        value: Value,
        tracer: &mut dyn WalkTracer,
    ) -> Result<Value, Self::Error> {
        let mut walk = Walk::new(heap, tracer, Mode::Construct);
        self.visit(&mut walk, value)
    }

    /// Dispatcher: routes leaves to [`visit_leaf`](Self::visit_leaf) and
    /// references through the identity table to
    /// [`visit_ref`](Self::visit_ref), or to
    /// [`visit_tagged`](Self::visit_tagged) when the node carries a tag.
    fn visit(&mut self, walk: &mut Walk<'_>, value: Value) -> Result<Value, Self::Error> {
        walk_value(self, walk, value)
    }

    /// Leaf hook: identity by default. The override point for scalar logic
    /// (counting, rewriting, validating). Never called for reference-typed
    /// values.
    fn visit_leaf(&mut self, _walk: &mut Walk<'_>, value: Value) -> Result<Value, Self::Error> {
        debug_assert!(!value.is_ref(), "visit_leaf called with a reference");
        Ok(value)
    }

    /// Shape router: dispatches a reference to the hook for its shape.
    fn visit_ref(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        walk_ref(self, walk, id)
    }

    /// Tagged-record hook: routes through the shape router, then reattaches
    /// the source tag to the constructed value via
    /// [`retain_tag`](Self::retain_tag).
    fn visit_tagged(
        &mut self,
        walk: &mut Walk<'_>,
        id: HeapId,
        tag: TypeTag,
    ) -> Result<Value, Self::Error> {
        walk_tagged(self, walk, id, tag)
    }

    /// Mapping hook.
    fn visit_mapping(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        walk_mapping(self, walk, id)
    }

    /// Key half of a mapping entry; runs the full dispatcher by default, so
    /// structured keys traverse like any other value. `owner` is the source
    /// mapping's node.
    fn visit_mapping_key(
        &mut self,
        walk: &mut Walk<'_>,
        key: Value,
        _owner: HeapId,
    ) -> Result<Value, Self::Error> {
        self.visit(walk, key)
    }

    /// Value half of a mapping entry. `key` is the source key, untransformed,
    /// and `owner` the source mapping's node, so a hook can rewrite the
    /// original entry in place through [`Walk::heap_mut`].
    fn visit_mapping_value(
        &mut self,
        walk: &mut Walk<'_>,
        value: Value,
        _key: Value,
        _owner: HeapId,
    ) -> Result<Value, Self::Error> {
        self.visit(walk, value)
    }

    /// Sequence hook. Order-preserving in both modes: output item `i` is the
    /// transform of input item `i`.
    fn visit_sequence(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        walk_sequence(self, walk, id)
    }

    /// One sequence item; `index` is its position in `owner`.
    fn visit_sequence_item(
        &mut self,
        walk: &mut Walk<'_>,
        item: Value,
        _index: usize,
        _owner: HeapId,
    ) -> Result<Value, Self::Error> {
        self.visit(walk, item)
    }

    /// Single-slot hook: transforms the inner value; construct mode wraps
    /// the result in a new slot node.
    fn visit_slot(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        walk_slot(self, walk, id)
    }

    /// Handle hook: visits each present slot; construct mode assembles a new
    /// handle from the slots that produced values.
    fn visit_handle(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        walk_handle(self, walk, id)
    }

    /// One present handle slot. Returning `Ok(None)` marks the slot absent:
    /// it is dropped from the constructed handle with a tracer warning,
    /// never an error. `Value::Unit` is an ordinary leaf, not absence.
    fn visit_handle_slot(
        &mut self,
        walk: &mut Walk<'_>,
        _aspect: HandleAspect,
        value: Value,
        _owner: HeapId,
    ) -> Result<Option<Value>, Self::Error> {
        self.visit(walk, value).map(Some)
    }

    /// Opaque hook: passes the reference through unchanged in both modes, so
    /// construct-mode output shares opaque nodes with the source. Override
    /// to translate host tokens instead.
    fn visit_opaque(&mut self, _walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        Ok(Value::Ref(id))
    }

    /// Tag reattachment: applies the source tag iff the produced value
    /// references an untagged node. A tag some hook already set is never
    /// overwritten.
    fn retain_tag(
        &mut self,
        walk: &mut Walk<'_>,
        tag: TypeTag,
        produced: Value,
    ) -> Result<(), Self::Error> {
        walk.retain_tag(tag, produced);
        Ok(())
    }
}

/// Default dispatcher body.
///
/// A reference already mapped in this call returns its recorded value. A
/// reference whose own traversal is still in progress (a custom construct
/// hook descended into its own value before registering a placeholder)
/// returns the original reference.
pub fn walk_value<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    value: Value,
) -> Result<Value, V::Error> {
    let Value::Ref(id) = value else {
        return visitor.visit_leaf(walk, value);
    };
    match walk.seen.get(&id).copied() {
        Some(Mapped::Done(mapped)) => {
            walk.tracer.on_revisit(id);
            return Ok(mapped);
        }
        Some(Mapped::InProgress) => {
            walk.tracer.on_revisit(id);
            return Ok(value);
        }
        None => {}
    }
    let node = walk.heap.get(id);
    let shape = node.shape();
    let tag = node.tag();
    walk.tracer.on_enter(id, shape);
    walk.seen.insert(id, Mapped::InProgress);
    let produced = match tag {
        Some(tag) => visitor.visit_tagged(walk, id, tag)?,
        None => visitor.visit_ref(walk, id)?,
    };
    if walk.mode == Mode::Construct {
        walk.seen.insert(id, Mapped::Done(produced));
    }
    Ok(produced)
}

/// Default shape-router body: exhaustive dispatch over the node's shape.
pub fn walk_ref<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    id: HeapId,
) -> Result<Value, V::Error> {
    match walk.heap.get(id).shape() {
        Shape::Mapping => visitor.visit_mapping(walk, id),
        Shape::Sequence => visitor.visit_sequence(walk, id),
        Shape::Slot => visitor.visit_slot(walk, id),
        Shape::Handle => visitor.visit_handle(walk, id),
        Shape::Opaque => visitor.visit_opaque(walk, id),
    }
}

/// Default tagged-record body: route by shape, then reattach the tag in
/// construct mode.
pub fn walk_tagged<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    id: HeapId,
    tag: TypeTag,
) -> Result<Value, V::Error> {
    let produced = visitor.visit_ref(walk, id)?;
    if walk.mode == Mode::Construct {
        visitor.retain_tag(walk, tag, produced)?;
    }
    Ok(produced)
}

/// Default mapping body.
///
/// Iterates over a snapshot of the entries, so hooks may mutate the original
/// mapping through the heap while traversal runs. In construct mode the
/// produced mapping is a placeholder registered before any child is visited;
/// if two source keys transform to the same produced key, the later entry
/// wins.
pub fn walk_mapping<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    id: HeapId,
) -> Result<Value, V::Error> {
    let pairs: Vec<(Value, Value)> = walk.heap.mapping(id).iter().collect();
    match walk.mode {
        Mode::Effect => {
            for (key, value) in pairs {
                visitor.visit_mapping_key(walk, key, id)?;
                visitor.visit_mapping_value(walk, value, key, id)?;
            }
            Ok(Value::Ref(id))
        }
        Mode::Construct => {
            let produced =
                walk.allocate_placeholder(id, Body::Mapping(Mapping::with_capacity(pairs.len())));
            for (key, value) in pairs {
                let new_key = visitor.visit_mapping_key(walk, key, id)?;
                let new_value = visitor.visit_mapping_value(walk, value, key, id)?;
                walk.heap.mapping_mut(produced).insert(new_key, new_value);
            }
            Ok(Value::Ref(produced))
        }
    }
}

/// Default sequence body: order-preserving over a snapshot of the items.
pub fn walk_sequence<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    id: HeapId,
) -> Result<Value, V::Error> {
    let items: Vec<Value> = walk.heap.sequence(id).iter().collect();
    match walk.mode {
        Mode::Effect => {
            for (index, item) in items.into_iter().enumerate() {
                visitor.visit_sequence_item(walk, item, index, id)?;
            }
            Ok(Value::Ref(id))
        }
        Mode::Construct => {
            let produced = walk
                .allocate_placeholder(id, Body::Sequence(Sequence::with_capacity(items.len())));
            for (index, item) in items.into_iter().enumerate() {
                let new_item = visitor.visit_sequence_item(walk, item, index, id)?;
                walk.heap.sequence_mut(produced).push(new_item);
            }
            Ok(Value::Ref(produced))
        }
    }
}

/// Default single-slot body: transform the inner value, wrap in construct
/// mode.
pub fn walk_slot<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    id: HeapId,
) -> Result<Value, V::Error> {
    let inner = walk.heap.slot(id);
    match walk.mode {
        Mode::Effect => {
            visitor.visit(walk, inner)?;
            Ok(Value::Ref(id))
        }
        Mode::Construct => {
            let produced = walk.allocate_placeholder(id, Body::Slot(Value::Unit));
            let new_inner = visitor.visit(walk, inner)?;
            *walk.heap.slot_mut(produced) = new_inner;
            Ok(Value::Ref(produced))
        }
    }
}

/// Default handle body: visits present slots in aspect order. Construct mode
/// assembles a new handle from the slots that produced values; a slot whose
/// hook returns `None` is dropped with a tracer warning.
pub fn walk_handle<V: Visitor>(
    visitor: &mut V,
    walk: &mut Walk<'_>,
    id: HeapId,
) -> Result<Value, V::Error> {
    let source = *walk.heap.handle(id);
    match walk.mode {
        Mode::Effect => {
            for aspect in HandleAspect::ALL {
                let Some(value) = source.get(aspect) else { continue };
                visitor.visit_handle_slot(walk, aspect, value, id)?;
            }
            Ok(Value::Ref(id))
        }
        Mode::Construct => {
            let produced = walk.allocate_placeholder(id, Body::Handle(Handle::new()));
            for aspect in HandleAspect::ALL {
                let Some(value) = source.get(aspect) else { continue };
                match visitor.visit_handle_slot(walk, aspect, value, id)? {
                    Some(new_value) => walk.heap.handle_mut(produced).set(aspect, new_value),
                    None => walk.tracer.on_slot_dropped(aspect, id),
                }
            }
            Ok(Value::Ref(produced))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Construct hook that re-enters its own value before registering a
    /// placeholder.
    struct Reentrant;

    impl Visitor for Reentrant {
        type Error = core::convert::Infallible;

        fn visit_mapping(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
            let again = self.visit(walk, Value::Ref(id))?;
            assert_eq!(again, Value::Ref(id));
            walk_mapping(self, walk, id)
        }
    }

    /// Re-entering a value before its placeholder exists hands back the
    /// original reference instead of recursing forever; the rest of the
    /// construction is unaffected.
    #[test]
    fn reentry_before_placeholder_returns_original() {
        let mut heap = Heap::new();
        let source = heap.alloc_mapping([(Value::Int(1), Value::Int(2))]);
        let mut visitor = Reentrant;
        let copy = visitor.traverse_and_build(&mut heap, source).unwrap();
        assert_ne!(source, copy);
        assert!(heap.deep_eq(source, copy));
    }
}
