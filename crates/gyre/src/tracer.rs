//! Traversal diagnostics.
//!
//! The engine reports events through the [`WalkTracer`] trait rather than a
//! logging facade, so embedders plug in whatever sink fits:
//!
//! | Tracer | Purpose |
//! |--------------------|----------------------------------------------|
//! | [`NoopTracer`] | Default for the plain entry points; ignores everything. |
//! | [`StderrTracer`] | Prints events and warnings to stderr. |
//! | [`RecordingTracer`]| Accumulates [`WalkEvent`]s for test assertions. |

use crate::heap::{HeapId, Shape};
use crate::shapes::HandleAspect;
use crate::value::TypeTag;

/// Observer for traversal events.
///
/// All methods have empty default bodies; implement only what you need.
/// Tracers are called re-entrantly during recursion but never shared across
/// top-level calls.
pub trait WalkTracer {
    /// First visit of a reference in the current call.
    fn on_enter(&mut self, _id: HeapId, _shape: Shape) {}

    /// A reference already visited in this call was reached again (shared
    /// substructure or a cycle).
    fn on_revisit(&mut self, _id: HeapId) {}

    /// A present handle slot transformed to absent and was dropped from the
    /// constructed handle.
    fn on_slot_dropped(&mut self, _aspect: HandleAspect, _handle: HeapId) {}

    /// A source tag was reattached to a freshly constructed value.
    fn on_tag_retained(&mut self, _tag: TypeTag, _produced: HeapId) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl WalkTracer for NoopTracer {}

/// Prints events to stderr; dropped-slot diagnostics carry a `warning:`
/// prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl WalkTracer for StderrTracer {
    fn on_enter(&mut self, id: HeapId, shape: Shape) {
        eprintln!("enter {shape} node {}", id.index());
    }

    fn on_revisit(&mut self, id: HeapId) {
        eprintln!("revisit node {}", id.index());
    }

    fn on_slot_dropped(&mut self, aspect: HandleAspect, handle: HeapId) {
        eprintln!(
            "warning: dropped {aspect} slot of handle node {}: transformed to absent",
            handle.index()
        );
    }

    fn on_tag_retained(&mut self, tag: TypeTag, produced: HeapId) {
        eprintln!("retained tag {tag:?} on node {}", produced.index());
    }
}

/// A recorded traversal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Enter { id: HeapId, shape: Shape },
    Revisit { id: HeapId },
    SlotDropped { aspect: HandleAspect, handle: HeapId },
    TagRetained { tag: TypeTag, produced: HeapId },
}

/// Accumulates events in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<WalkEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> &[WalkEvent] {
        &self.events
    }

    /// Number of recorded events matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&WalkEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl WalkTracer for RecordingTracer {
    fn on_enter(&mut self, id: HeapId, shape: Shape) {
        self.events.push(WalkEvent::Enter { id, shape });
    }

    fn on_revisit(&mut self, id: HeapId) {
        self.events.push(WalkEvent::Revisit { id });
    }

    fn on_slot_dropped(&mut self, aspect: HandleAspect, handle: HeapId) {
        self.events.push(WalkEvent::SlotDropped { aspect, handle });
    }

    fn on_tag_retained(&mut self, tag: TypeTag, produced: HeapId) {
        self.events.push(WalkEvent::TagRetained { tag, produced });
    }
}
