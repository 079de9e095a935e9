#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "interned ids stay within u32")]

mod heap;
mod intern;
mod shapes;
mod tracer;
mod value;
mod visit;

pub use crate::{
    heap::{Body, Heap, HeapId, HeapStats, Node, OpaqueId, Shape},
    intern::StrId,
    shapes::{Handle, HandleAspect, Mapping, Sequence},
    tracer::{NoopTracer, RecordingTracer, StderrTracer, WalkEvent, WalkTracer},
    value::{TypeTag, Value},
    visit::{
        Mode, Visitor, Walk, walk_handle, walk_mapping, walk_ref, walk_sequence, walk_slot,
        walk_tagged, walk_value,
    },
};
