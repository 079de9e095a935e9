use std::hash::{Hash, Hasher};
use std::mem::discriminant;

use crate::heap::HeapId;
use crate::intern::StrId;

/// A traversable value.
///
/// Hybrid layout: scalar leaves are immediate and freely copyable, while
/// containers live in a caller-owned [`Heap`](crate::Heap) and are referenced
/// through [`HeapId`]. `Value` is 16 bytes and `Copy`, so traversal code can
/// snapshot container entries without touching the heap.
///
/// Equality is shallow: leaves compare by content (floats by bit pattern, so
/// `NaN` can key a mapping and `0.0` and `-0.0` are distinct keys) and
/// references compare by identity. Structural comparison that follows
/// references is [`Heap::deep_eq`](crate::Heap::deep_eq).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// The unit leaf. A real value, not an absence marker.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// An interned string leaf. Ids are scoped to the heap that interned them.
    Str(StrId),
    /// A reference to a heap node.
    Ref(HeapId),
}

impl Value {
    /// True for reference-typed values.
    #[must_use]
    pub fn is_ref(self) -> bool {
        matches!(self, Self::Ref(_))
    }

    /// The referenced node id, if this value is reference-typed.
    #[must_use]
    pub fn heap_id(self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(id),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            Self::Unit => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Str(id) => id.hash(state),
            Self::Ref(id) => id.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

/// An opaque marker identifying a container's logical type, independent of
/// its physical shape.
///
/// Tags are interned names; create them with [`Heap::tag`](crate::Heap::tag)
/// and resolve them with [`Heap::tag_name`](crate::Heap::tag_name). Two tags
/// from the same heap are equal exactly when their names are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TypeTag(StrId);

impl TypeTag {
    pub(crate) fn new(name: StrId) -> Self {
        Self(name)
    }

    pub(crate) fn name_id(self) -> StrId {
        self.0
    }
}
