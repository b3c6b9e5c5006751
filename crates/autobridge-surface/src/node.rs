//! Opaque node model for the target surface.
//!
//! A host embedding adapts its live object graph to [`TargetNode`]. The bridge
//! never learns concrete node types: everything is discovered by name at
//! runtime, and any lookup may legitimately come back empty.

use std::fmt;
use std::sync::Arc;

use crate::error::SurfaceError;

/// Shared handle to a node owned by the target surface.
///
/// Handles are valid only for the traversal or extraction call that produced
/// them; the surface may tear its graph down between calls.
pub type NodeRef = Arc<dyn TargetNode>;

/// Kind of a value crossing the introspection boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    List,
    Node,
}

/// Dynamically typed value read from or passed to a node.
#[derive(Clone)]
pub enum SurfaceValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<SurfaceValue>),
    Node(NodeRef),
}

impl SurfaceValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SurfaceValue::Null => ValueKind::Null,
            SurfaceValue::Bool(_) => ValueKind::Bool,
            SurfaceValue::Int(_) => ValueKind::Int,
            SurfaceValue::Float(_) => ValueKind::Float,
            SurfaceValue::Text(_) => ValueKind::Text,
            SurfaceValue::List(_) => ValueKind::List,
            SurfaceValue::Node(_) => ValueKind::Node,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SurfaceValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SurfaceValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SurfaceValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SurfaceValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            SurfaceValue::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SurfaceValue]> {
        match self {
            SurfaceValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Debug for SurfaceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceValue::Null => write!(f, "Null"),
            SurfaceValue::Bool(b) => write!(f, "Bool({})", b),
            SurfaceValue::Int(n) => write!(f, "Int({})", n),
            SurfaceValue::Float(x) => write!(f, "Float({})", x),
            SurfaceValue::Text(s) => write!(f, "Text({:?})", s),
            SurfaceValue::List(items) => f.debug_list().entries(items).finish(),
            SurfaceValue::Node(n) => write!(f, "Node({})", n.type_name()),
        }
    }
}

impl From<bool> for SurfaceValue {
    fn from(value: bool) -> Self {
        SurfaceValue::Bool(value)
    }
}

impl From<i64> for SurfaceValue {
    fn from(value: i64) -> Self {
        SurfaceValue::Int(value)
    }
}

impl From<&str> for SurfaceValue {
    fn from(value: &str) -> Self {
        SurfaceValue::Text(value.to_string())
    }
}

impl From<String> for SurfaceValue {
    fn from(value: String) -> Self {
        SurfaceValue::Text(value)
    }
}

/// Kind of member a node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    /// A method taking no argument or exactly one argument of the given kind.
    Method { param: Option<ValueKind> },
}

/// A named member discovered on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
}

impl Member {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field,
        }
    }

    pub fn method(name: impl Into<String>, param: Option<ValueKind>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method { param },
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MemberKind::Field => write!(f, "{}", self.name),
            MemberKind::Method { param: None } => write!(f, "{}()", self.name),
            MemberKind::Method { param: Some(kind) } => write!(f, "{}({:?})", self.name, kind),
        }
    }
}

/// One node of the target surface's object graph.
///
/// Implementations may fail on any call; callers treat failures as "absent".
pub trait TargetNode: Send + Sync {
    /// Concrete type identity of the node.
    fn type_name(&self) -> &str;

    /// Members this node's type exposes.
    fn members(&self) -> Vec<Member>;

    /// Child collection, or `None` when the node is not a container.
    fn children(&self) -> Result<Option<Vec<NodeRef>>, SurfaceError>;

    /// Invoke a zero- or one-argument method.
    fn call(&self, method: &str, arg: Option<SurfaceValue>) -> Result<SurfaceValue, SurfaceError>;

    /// Read a field.
    fn read(&self, field: &str) -> Result<SurfaceValue, SurfaceError>;

    /// Write a field.
    fn write(&self, field: &str, value: SurfaceValue) -> Result<(), SurfaceError>;
}

/// Entry point into the target surface.
///
/// Called only from the UI confinement context.
pub trait SurfaceProvider: Send + Sync {
    /// Root of the chat panel, if the target currently shows one.
    fn root(&self) -> Option<NodeRef>;
}

/// Provider for a bridge running without an embedding host.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSurface;

impl SurfaceProvider for DetachedSurface {
    fn root(&self) -> Option<NodeRef> {
        None
    }
}
