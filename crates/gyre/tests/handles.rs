//! Handle traversal: per-slot hooks, absence, and slot dropping.

use std::convert::Infallible;

use gyre::{
    Handle, HandleAspect, Heap, HeapId, RecordingTracer, Shape, Value, Visitor, Walk, WalkEvent,
};

/// Pass-through deep copy: every hook is a default.
struct DeepCopy;

impl Visitor for DeepCopy {
    type Error = Infallible;
}

#[test]
fn absent_slots_stay_absent() {
    let mut heap = Heap::new();
    let source = heap.alloc_handle(Handle::new().with_scalar(Value::Int(5)));

    let copy = DeepCopy.traverse_and_build(&mut heap, source).unwrap();

    let copied = heap.handle(copy.heap_id().unwrap());
    assert_eq!(copied.get(HandleAspect::Scalar), Some(Value::Int(5)));
    assert_eq!(copied.get(HandleAspect::Sequence), None);
    assert_eq!(copied.get(HandleAspect::Mapping), None);
    assert_eq!(copied.present().as_slice(), &[HandleAspect::Scalar]);
}

#[test]
fn unit_slot_is_present_not_absent() {
    let mut heap = Heap::new();
    let source = heap.alloc_handle(Handle::new().with_scalar(Value::Unit));

    let copy = DeepCopy.traverse_and_build(&mut heap, source).unwrap();

    let copied = heap.handle(copy.heap_id().unwrap());
    assert_eq!(copied.get(HandleAspect::Scalar), Some(Value::Unit));
    assert!(!copied.is_empty());
}

/// Drops the sequence aspect of every handle; other slots pass through.
struct DropSequenceSlot;

impl Visitor for DropSequenceSlot {
    type Error = Infallible;

    fn visit_handle_slot(
        &mut self,
        walk: &mut Walk<'_>,
        aspect: HandleAspect,
        value: Value,
        _owner: HeapId,
    ) -> Result<Option<Value>, Self::Error> {
        if aspect == HandleAspect::Sequence {
            return Ok(None);
        }
        self.visit(walk, value).map(Some)
    }
}

#[test]
fn dropping_a_slot_warns_and_omits_it() {
    let mut heap = Heap::new();
    let items = heap.alloc_sequence([Value::Int(1)]);
    let source = heap.alloc_handle(Handle::new().with_scalar(Value::Int(9)).with_sequence(items));
    let source_id = source.heap_id().unwrap();

    let mut tracer = RecordingTracer::new();
    let copy =
        DropSequenceSlot.traverse_and_build_with_tracer(&mut heap, source, &mut tracer).unwrap();

    let copied = heap.handle(copy.heap_id().unwrap());
    assert_eq!(copied.get(HandleAspect::Scalar), Some(Value::Int(9)));
    assert_eq!(copied.get(HandleAspect::Sequence), None);
    assert!(tracer.events().contains(&WalkEvent::SlotDropped {
        aspect: HandleAspect::Sequence,
        handle: source_id,
    }));
    // The dropped slot's value was never descended into.
    assert_eq!(
        tracer.count(|event| matches!(event, WalkEvent::Enter { shape: Shape::Sequence, .. })),
        0
    );
    // The source handle still has both slots.
    assert_eq!(heap.handle(source_id).present().len(), 2);
}

#[test]
fn handle_cycle_through_mapping_resolves_to_the_copy() {
    let mut heap = Heap::new();
    let owner_key = heap.str_value("owner");
    let source = heap.alloc_handle(Handle::new());
    let registry = heap.alloc_mapping([(owner_key, source)]);
    heap.handle_mut(source.heap_id().unwrap()).set(HandleAspect::Mapping, registry);

    let copy = DeepCopy.traverse_and_build(&mut heap, source).unwrap();

    let copied_registry =
        heap.handle(copy.heap_id().unwrap()).get(HandleAspect::Mapping).unwrap();
    assert_ne!(copied_registry, registry);
    // The copied registry points back at the copied handle.
    assert_eq!(heap.mapping(copied_registry.heap_id().unwrap()).get(owner_key), Some(copy));
}

#[test]
fn effect_mode_enters_present_slots_only() {
    let mut heap = Heap::new();
    let name = heap.str_value("name");
    let attrs = heap.alloc_mapping([(name, Value::Bool(true))]);
    let source = heap.alloc_handle(Handle::new().with_scalar(Value::Int(1)).with_mapping(attrs));

    let mut tracer = RecordingTracer::new();
    DeepCopy.traverse_for_effect_with_tracer(&mut heap, source, &mut tracer).unwrap();

    assert_eq!(
        tracer.events(),
        &[
            WalkEvent::Enter { id: source.heap_id().unwrap(), shape: Shape::Handle },
            WalkEvent::Enter { id: attrs.heap_id().unwrap(), shape: Shape::Mapping },
        ]
    );
}
