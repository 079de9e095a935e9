//! Effect-mode traversal: side effects without construction.
//!
//! Covers counting over shared leaves, in-place mutation of the original
//! containers, the per-call reset of identity tracking, and error
//! propagation from hooks in both modes.

use std::convert::Infallible;

use gyre::{Heap, HeapId, RecordingTracer, StrId, Value, Visitor, Walk, WalkEvent, walk_sequence};

/// Pass-through deep copy: every hook is a default.
struct DeepCopy;

impl Visitor for DeepCopy {
    type Error = Infallible;
}

/// Counts occurrences of one interned string leaf.
struct CountStr {
    needle: StrId,
    count: usize,
}

impl Visitor for CountStr {
    type Error = Infallible;

    fn visit_leaf(&mut self, _walk: &mut Walk<'_>, value: Value) -> Result<Value, Self::Error> {
        if value == Value::Str(self.needle) {
            self.count += 1;
        }
        Ok(value)
    }
}

#[test]
fn counting_visitor_sees_each_leaf_position() {
    let mut heap = Heap::new();
    let foo = heap.intern("foo");
    let source = heap.alloc_sequence([
        Value::Int(1),
        Value::Str(foo),
        Value::Int(2),
        Value::Str(foo),
    ]);
    let before = heap.stats();

    let mut visitor = CountStr { needle: foo, count: 0 };
    visitor.traverse_for_effect(&mut heap, source).unwrap();

    // Leaves are not identity-tracked: both positions count.
    assert_eq!(visitor.count, 2);
    // Effect mode allocated nothing.
    assert_eq!(heap.stats(), before);
}

/// Doubles integers in the original sequence through the heap.
struct DoubleInPlace;

impl Visitor for DoubleInPlace {
    type Error = Infallible;

    fn visit_sequence_item(
        &mut self,
        walk: &mut Walk<'_>,
        item: Value,
        index: usize,
        owner: HeapId,
    ) -> Result<Value, Self::Error> {
        if let Value::Int(i) = item {
            walk.heap_mut().sequence_mut(owner).set(index, Value::Int(i * 2));
        }
        self.visit(walk, item)
    }
}

#[test]
fn hooks_may_mutate_the_original_in_place() {
    let mut heap = Heap::new();
    let source = heap.alloc_sequence([Value::Int(1), Value::Int(2), Value::Int(3)]);

    DoubleInPlace.traverse_for_effect(&mut heap, source).unwrap();

    assert_eq!(heap.render(source), "[2, 4, 6]");
}

/// Reverses every sequence in place before walking it.
struct ReverseInPlace;

impl Visitor for ReverseInPlace {
    type Error = Infallible;

    fn visit_sequence(&mut self, walk: &mut Walk<'_>, id: HeapId) -> Result<Value, Self::Error> {
        walk.heap_mut().sequence_mut(id).as_mut_slice().reverse();
        walk_sequence(self, walk, id)
    }
}

#[test]
fn container_hook_may_rewrite_before_delegating() {
    let mut heap = Heap::new();
    let inner = heap.alloc_sequence([Value::Int(1), Value::Int(2)]);
    let source = heap.alloc_sequence([inner, Value::Int(3)]);

    ReverseInPlace.traverse_for_effect(&mut heap, source).unwrap();

    // The outer reversal lands before its items are walked, so the inner
    // sequence is reversed as well.
    assert_eq!(heap.render(source), "[3, [2, 1]]");
}

/// Negates integer values in the original mapping through the heap.
struct NegateValues;

impl Visitor for NegateValues {
    type Error = Infallible;

    fn visit_mapping_value(
        &mut self,
        walk: &mut Walk<'_>,
        value: Value,
        key: Value,
        owner: HeapId,
    ) -> Result<Value, Self::Error> {
        if let Value::Int(i) = value {
            walk.heap_mut().mapping_mut(owner).insert(key, Value::Int(-i));
        }
        self.visit(walk, value)
    }
}

#[test]
fn mapping_hooks_may_rewrite_entries_in_place() {
    let mut heap = Heap::new();
    let source = heap.alloc_mapping([
        (Value::Int(1), Value::Int(10)),
        (Value::Int(2), Value::Int(20)),
    ]);

    NegateValues.traverse_for_effect(&mut heap, source).unwrap();

    assert_eq!(heap.render(source), "{1: -10, 2: -20}");
}

/// Rewrites the mapping's membership while it is being walked.
struct Reshape {
    visited: Vec<Value>,
}

impl Visitor for Reshape {
    type Error = Infallible;

    fn visit_mapping_value(
        &mut self,
        walk: &mut Walk<'_>,
        value: Value,
        key: Value,
        owner: HeapId,
    ) -> Result<Value, Self::Error> {
        self.visited.push(key);
        if key == Value::Int(1) {
            let entries = walk.heap_mut().mapping_mut(owner);
            entries.remove(Value::Int(2));
            entries.insert(Value::Int(3), Value::Bool(true));
        }
        self.visit(walk, value)
    }
}

#[test]
fn mapping_membership_may_change_mid_walk() {
    let mut heap = Heap::new();
    let source = heap.alloc_mapping([
        (Value::Int(1), Value::Int(10)),
        (Value::Int(2), Value::Int(20)),
    ]);

    let mut visitor = Reshape { visited: Vec::new() };
    visitor.traverse_for_effect(&mut heap, source).unwrap();

    // The walk iterates the entry snapshot taken when the mapping was
    // entered: the removed entry is still visited, the added one is not.
    assert_eq!(visitor.visited, vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(heap.render(source), "{1: 10, 3: true}");
}

#[test]
fn identity_tracking_resets_between_calls() {
    let mut heap = Heap::new();
    let inner = heap.alloc_sequence([Value::Int(1)]);
    let outer = heap.alloc_sequence([inner, inner]);

    let mut tracer = RecordingTracer::new();
    DeepCopy.traverse_for_effect_with_tracer(&mut heap, outer, &mut tracer).unwrap();
    assert_eq!(tracer.count(|event| matches!(event, WalkEvent::Enter { .. })), 2);
    assert_eq!(tracer.count(|event| matches!(event, WalkEvent::Revisit { .. })), 1);

    // A second call starts from a clean identity table and enters everything
    // again; a stale table would report a single revisit instead.
    tracer.clear();
    DeepCopy.traverse_for_effect_with_tracer(&mut heap, outer, &mut tracer).unwrap();
    assert_eq!(tracer.count(|event| matches!(event, WalkEvent::Enter { .. })), 2);
    assert_eq!(tracer.count(|event| matches!(event, WalkEvent::Revisit { .. })), 1);
}

// ============================================================================
// Error propagation
// ============================================================================

/// Fails on the first negative integer leaf.
struct FailOnNegative;

impl Visitor for FailOnNegative {
    type Error = String;

    fn visit_leaf(&mut self, _walk: &mut Walk<'_>, value: Value) -> Result<Value, Self::Error> {
        if let Value::Int(i) = value
            && i < 0
        {
            return Err(format!("negative leaf: {i}"));
        }
        Ok(value)
    }
}

#[test]
fn hook_error_aborts_effect_traversal_unchanged() {
    let mut heap = Heap::new();
    let source = heap.alloc_sequence([Value::Int(1), Value::Int(-2), Value::Int(3)]);
    let err = FailOnNegative.traverse_for_effect(&mut heap, source).unwrap_err();
    assert_eq!(err, "negative leaf: -2");
}

#[test]
fn hook_error_aborts_construction_unchanged() {
    let mut heap = Heap::new();
    let items = heap.alloc_sequence([Value::Int(-7)]);
    let source = heap.alloc_mapping([(Value::Int(1), items)]);
    let err = FailOnNegative.traverse_and_build(&mut heap, source).unwrap_err();
    assert_eq!(err, "negative leaf: -7");
    // The source survives an aborted construction.
    assert_eq!(heap.render(source), "{1: [-7]}");
}
