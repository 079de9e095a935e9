use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use ahash::AHashSet;

use crate::intern::{Interner, StrId};
use crate::shapes::{Handle, HandleAspect, Mapping, Sequence};
use crate::value::{TypeTag, Value};

/// Reference to a node in the heap.
///
/// Heap ids are arena slot indices: stable for the life of the heap, cheap to
/// copy and hash, and distinct from node content. Identity comparison during
/// traversal is id comparison; content-equal nodes allocated separately have
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// The underlying slot index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Host-owned token carried by an opaque node.
///
/// Opaque nodes have identity but no traversable interior; the token lets an
/// embedding map them back to whatever foreign object they stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct OpaqueId(u32);

impl OpaqueId {
    /// Creates a token from a raw integer.
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer token.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Classifies a heap node by its container shape.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum Shape {
    Mapping,
    Sequence,
    Slot,
    Handle,
    Opaque,
}

/// The payload of a heap node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Body {
    Mapping(Mapping),
    Sequence(Sequence),
    /// A single-slot reference: exactly one inner value, distinguishable at
    /// the type level from the inner value itself.
    Slot(Value),
    Handle(Handle),
    /// Foreign data the engine cannot descend into. Passes through traversal
    /// unchanged in both modes.
    Opaque(OpaqueId),
}

impl Body {
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Mapping(_) => Shape::Mapping,
            Self::Sequence(_) => Shape::Sequence,
            Self::Slot(_) => Shape::Slot,
            Self::Handle(_) => Shape::Handle,
            Self::Opaque(_) => Shape::Opaque,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Self::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_slot(&self) -> Option<Value> {
        match self {
            Self::Slot(inner) => Some(*inner),
            _ => None,
        }
    }

    pub fn as_slot_mut(&mut self) -> Option<&mut Value> {
        match self {
            Self::Slot(inner) => Some(inner),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_handle_mut(&mut self) -> Option<&mut Handle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_opaque(&self) -> Option<OpaqueId> {
        match self {
            Self::Opaque(token) => Some(*token),
            _ => None,
        }
    }
}

/// A heap node: a container body plus an optional type tag.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    tag: Option<TypeTag>,
    body: Body,
}

impl Node {
    /// An untagged node.
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self { tag: None, body }
    }

    /// A tagged node.
    #[must_use]
    pub fn tagged(tag: TypeTag, body: Body) -> Self {
        Self { tag: Some(tag), body }
    }

    #[must_use]
    pub fn tag(&self) -> Option<TypeTag> {
        self.tag
    }

    pub fn set_tag(&mut self, tag: Option<TypeTag>) {
        self.tag = tag;
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.body.shape()
    }
}

/// Point-in-time summary of heap contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live nodes.
    pub live_nodes: usize,
    /// Node counts keyed by shape name. Shapes with no nodes are omitted.
    pub nodes_by_shape: BTreeMap<&'static str, usize>,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "live_nodes: {}", self.live_nodes)?;
        for (shape, count) in &self.nodes_by_shape {
            write!(f, ", {shape}: {count}")?;
        }
        Ok(())
    }
}

/// Arena of traversable nodes plus the interner for leaf strings.
///
/// The heap is caller-owned and outlives traversals; construct-mode output is
/// allocated into the same heap as its source. Nodes are never individually
/// freed: the arena grows monotonically and is reclaimed wholesale when the
/// heap is dropped.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Heap {
    entries: Vec<Node>,
    interns: Interner,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity), interns: Interner::default() }
    }

    /// Allocates a node, returning its id.
    pub fn allocate(&mut self, node: Node) -> HeapId {
        let id = HeapId(self.entries.len());
        self.entries.push(node);
        id
    }

    /// Returns the node stored at the given id.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &Node {
        self.entries.get(id.index()).expect("Heap::get: unknown heap id")
    }

    /// Returns a mutable reference to the node stored at the given id.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap.
    pub fn get_mut(&mut self, id: HeapId) -> &mut Node {
        self.entries.get_mut(id.index()).expect("Heap::get_mut: unknown heap id")
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The mapping stored at `id`.
    ///
    /// # Panics
    /// Panics if the id is unknown or the node is not a mapping.
    #[must_use]
    pub fn mapping(&self, id: HeapId) -> &Mapping {
        self.get(id).body().as_mapping().expect("Heap::mapping: node is not a mapping")
    }

    /// # Panics
    /// Panics if the id is unknown or the node is not a mapping.
    pub fn mapping_mut(&mut self, id: HeapId) -> &mut Mapping {
        self.get_mut(id)
            .body_mut()
            .as_mapping_mut()
            .expect("Heap::mapping_mut: node is not a mapping")
    }

    /// The sequence stored at `id`.
    ///
    /// # Panics
    /// Panics if the id is unknown or the node is not a sequence.
    #[must_use]
    pub fn sequence(&self, id: HeapId) -> &Sequence {
        self.get(id).body().as_sequence().expect("Heap::sequence: node is not a sequence")
    }

    /// # Panics
    /// Panics if the id is unknown or the node is not a sequence.
    pub fn sequence_mut(&mut self, id: HeapId) -> &mut Sequence {
        self.get_mut(id)
            .body_mut()
            .as_sequence_mut()
            .expect("Heap::sequence_mut: node is not a sequence")
    }

    /// The inner value of the slot node at `id`.
    ///
    /// # Panics
    /// Panics if the id is unknown or the node is not a slot.
    #[must_use]
    pub fn slot(&self, id: HeapId) -> Value {
        self.get(id).body().as_slot().expect("Heap::slot: node is not a slot")
    }

    /// # Panics
    /// Panics if the id is unknown or the node is not a slot.
    pub fn slot_mut(&mut self, id: HeapId) -> &mut Value {
        self.get_mut(id).body_mut().as_slot_mut().expect("Heap::slot_mut: node is not a slot")
    }

    /// The handle stored at `id`.
    ///
    /// # Panics
    /// Panics if the id is unknown or the node is not a handle.
    #[must_use]
    pub fn handle(&self, id: HeapId) -> &Handle {
        self.get(id).body().as_handle().expect("Heap::handle: node is not a handle")
    }

    /// # Panics
    /// Panics if the id is unknown or the node is not a handle.
    pub fn handle_mut(&mut self, id: HeapId) -> &mut Handle {
        self.get_mut(id).body_mut().as_handle_mut().expect("Heap::handle_mut: node is not a handle")
    }

    /// The token of the opaque node at `id`.
    ///
    /// # Panics
    /// Panics if the id is unknown or the node is not opaque.
    #[must_use]
    pub fn opaque(&self, id: HeapId) -> OpaqueId {
        self.get(id).body().as_opaque().expect("Heap::opaque: node is not opaque")
    }

    /// Allocates an untagged mapping node from `(key, value)` pairs.
    pub fn alloc_mapping(&mut self, pairs: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::Ref(self.allocate(Node::new(Body::Mapping(Mapping::from_pairs(pairs)))))
    }

    /// Allocates an untagged sequence node.
    pub fn alloc_sequence(&mut self, items: impl IntoIterator<Item = Value>) -> Value {
        let items: Vec<Value> = items.into_iter().collect();
        Value::Ref(self.allocate(Node::new(Body::Sequence(Sequence::new(items)))))
    }

    /// Allocates an untagged single-slot node holding `inner`.
    pub fn alloc_slot(&mut self, inner: Value) -> Value {
        Value::Ref(self.allocate(Node::new(Body::Slot(inner))))
    }

    /// Allocates an untagged handle node.
    pub fn alloc_handle(&mut self, handle: Handle) -> Value {
        Value::Ref(self.allocate(Node::new(Body::Handle(handle))))
    }

    /// Allocates an opaque node carrying a host token.
    pub fn alloc_opaque(&mut self, token: OpaqueId) -> Value {
        Value::Ref(self.allocate(Node::new(Body::Opaque(token))))
    }

    /// Interns a string, returning its id.
    pub fn intern(&mut self, s: &str) -> StrId {
        self.interns.intern(s)
    }

    /// Convenience: an interned string leaf.
    pub fn str_value(&mut self, s: &str) -> Value {
        Value::Str(self.intern(s))
    }

    /// Resolves an interned string id.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap.
    #[must_use]
    pub fn resolve(&self, id: StrId) -> &str {
        self.interns.resolve(id)
    }

    /// Creates (or reuses) the tag with the given name.
    pub fn tag(&mut self, name: &str) -> TypeTag {
        TypeTag::new(self.interns.intern(name))
    }

    /// Resolves a tag back to its name.
    ///
    /// # Panics
    /// Panics if the tag did not come from this heap.
    #[must_use]
    pub fn tag_name(&self, tag: TypeTag) -> &str {
        self.interns.resolve(tag.name_id())
    }

    /// The tag on the node at `id`, if any.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap.
    #[must_use]
    pub fn tag_of(&self, id: HeapId) -> Option<TypeTag> {
        self.get(id).tag()
    }

    /// Tags the referenced node iff `value` is a reference to an untagged
    /// node. Returns whether the tag was applied.
    pub fn tag_if_untagged(&mut self, value: Value, tag: TypeTag) -> bool {
        let Value::Ref(id) = value else { return false };
        let node = self.get_mut(id);
        if node.tag().is_some() {
            return false;
        }
        node.set_tag(Some(tag));
        true
    }

    /// Summarizes the heap's contents.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut nodes_by_shape: BTreeMap<&'static str, usize> = BTreeMap::new();
        for node in &self.entries {
            *nodes_by_shape.entry(node.shape().into()).or_insert(0) += 1;
        }
        HeapStats { live_nodes: self.entries.len(), nodes_by_shape }
    }

    /// Structural equality between two values of this heap.
    ///
    /// Follows references, compares mappings order-insensitively, requires
    /// tags to match, and compares opaque nodes by token. Cycle-safe: a pair
    /// of references already under comparison is assumed equal (coinductive),
    /// so two structures that loop the same way compare equal. On graphs that
    /// combine reference-typed mapping keys with shared substructure the
    /// coinductive assumption can over-approximate; intended for tests and
    /// diagnostics.
    #[must_use]
    pub fn deep_eq(&self, a: Value, b: Value) -> bool {
        let mut assumed = AHashSet::new();
        self.deep_eq_inner(a, b, &mut assumed)
    }

    fn deep_eq_inner(&self, a: Value, b: Value, assumed: &mut AHashSet<(HeapId, HeapId)>) -> bool {
        let (Value::Ref(left), Value::Ref(right)) = (a, b) else {
            return a == b;
        };
        if left == right {
            return true;
        }
        if !assumed.insert((left, right)) {
            return true;
        }
        let left_node = self.get(left);
        let right_node = self.get(right);
        if left_node.tag() != right_node.tag() {
            return false;
        }
        match (left_node.body(), right_node.body()) {
            (Body::Mapping(ma), Body::Mapping(mb)) => self.mapping_eq(ma, mb, assumed),
            (Body::Sequence(sa), Body::Sequence(sb)) => {
                sa.len() == sb.len()
                    && sa.iter().zip(sb.iter()).all(|(x, y)| self.deep_eq_inner(x, y, assumed))
            }
            (Body::Slot(x), Body::Slot(y)) => self.deep_eq_inner(*x, *y, assumed),
            (Body::Handle(ha), Body::Handle(hb)) => {
                HandleAspect::ALL.into_iter().all(|aspect| match (ha.get(aspect), hb.get(aspect)) {
                    (Some(x), Some(y)) => self.deep_eq_inner(x, y, assumed),
                    (None, None) => true,
                    _ => false,
                })
            }
            (Body::Opaque(ta), Body::Opaque(tb)) => ta == tb,
            _ => false,
        }
    }

    fn mapping_eq(
        &self,
        a: &Mapping,
        b: &Mapping,
        assumed: &mut AHashSet<(HeapId, HeapId)>,
    ) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().all(|(key, value)| {
            // Fast path: the key is present verbatim (leaf content, or the
            // same reference identity).
            if let Some(other) = b.get(key)
                && self.deep_eq_inner(value, other, assumed)
            {
                return true;
            }
            // Reference-typed keys may only match structurally.
            b.iter().any(|(other_key, other_value)| {
                self.deep_eq_inner(key, other_key, assumed)
                    && self.deep_eq_inner(value, other_value, assumed)
            })
        })
    }

    /// Compact, cycle-safe textual form for debugging and assertions.
    ///
    /// Sequences render as `[a, b]`, mappings as `{k: v}`, slots as `&v`,
    /// handles as `handle{aspect: v}`, opaque nodes as `opaque#N`, tags as a
    /// `name!` prefix, and any reference already on the current render path
    /// as `...`.
    #[must_use]
    pub fn render(&self, value: Value) -> String {
        let mut out = String::new();
        let mut on_path = Vec::new();
        // Writing into a String cannot fail.
        let _ = self.render_inner(value, &mut on_path, &mut out);
        out
    }

    fn render_inner(
        &self,
        value: Value,
        on_path: &mut Vec<HeapId>,
        out: &mut String,
    ) -> fmt::Result {
        match value {
            Value::Unit => out.push_str("unit"),
            Value::Bool(b) => write!(out, "{b}")?,
            Value::Int(i) => write!(out, "{i}")?,
            Value::Float(x) => write!(out, "{x:?}")?,
            Value::Str(id) => write!(out, "{:?}", self.resolve(id))?,
            Value::Ref(id) => {
                if on_path.contains(&id) {
                    out.push_str("...");
                    return Ok(());
                }
                on_path.push(id);
                let node = self.get(id);
                if let Some(tag) = node.tag() {
                    write!(out, "{}!", self.tag_name(tag))?;
                }
                match node.body() {
                    Body::Sequence(sequence) => {
                        out.push('[');
                        for (i, item) in sequence.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            self.render_inner(item, on_path, out)?;
                        }
                        out.push(']');
                    }
                    Body::Mapping(mapping) => {
                        out.push('{');
                        for (i, (key, entry_value)) in mapping.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            self.render_inner(key, on_path, out)?;
                            out.push_str(": ");
                            self.render_inner(entry_value, on_path, out)?;
                        }
                        out.push('}');
                    }
                    Body::Slot(inner) => {
                        out.push('&');
                        self.render_inner(*inner, on_path, out)?;
                    }
                    Body::Handle(handle) => {
                        out.push_str("handle{");
                        let mut first = true;
                        for aspect in HandleAspect::ALL {
                            let Some(inner) = handle.get(aspect) else { continue };
                            if !first {
                                out.push_str(", ");
                            }
                            first = false;
                            write!(out, "{aspect}: ")?;
                            self.render_inner(inner, on_path, out)?;
                        }
                        out.push('}');
                    }
                    Body::Opaque(token) => write!(out, "opaque#{}", token.raw())?,
                }
                on_path.pop();
            }
        }
        Ok(())
    }
}
