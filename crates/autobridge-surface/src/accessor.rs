//! Cached, absent-on-miss access to opaque nodes.
//!
//! Target versions vary, so a missing member is an ordinary outcome rather
//! than an error. Member resolution is cached per (concrete type, member name,
//! member kind); misses are cached exactly like hits.

use dashmap::DashMap;
use tracing::debug;

use crate::node::{Member, MemberKind, NodeRef, SurfaceValue};

type CacheKey = (String, String, MemberKind);

/// Reflection-style accessor over [`TargetNode`](crate::TargetNode)s.
#[derive(Default)]
pub struct Accessor {
    resolved: DashMap<CacheKey, bool>,
}

impl Accessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached member resolutions.
    pub fn cached_lookups(&self) -> usize {
        self.resolved.len()
    }

    /// Invoke a zero- or one-argument method and return its non-null result.
    ///
    /// Returns `None` if the method does not exist, raises, or returns null.
    pub fn invoke(&self, node: &NodeRef, method: &str, arg: Option<SurfaceValue>) -> Option<SurfaceValue> {
        match self.call(node, method, arg) {
            Some(SurfaceValue::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    /// Invoke a method for its side effect; `true` when the call completed.
    pub fn invoke_void(&self, node: &NodeRef, method: &str, arg: Option<SurfaceValue>) -> bool {
        self.call(node, method, arg).is_some()
    }

    /// Read a field; `None` if absent, unreadable or null.
    pub fn get_field(&self, node: &NodeRef, field: &str) -> Option<SurfaceValue> {
        if !self.resolve(node, field, MemberKind::Field) {
            return None;
        }
        match node.read(field) {
            Ok(SurfaceValue::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Reading {}.{} failed: {}", node.type_name(), field, e);
                None
            }
        }
    }

    /// Write a field; `false` if absent or the write raised.
    pub fn set_field(&self, node: &NodeRef, field: &str, value: SurfaceValue) -> bool {
        if !self.resolve(node, field, MemberKind::Field) {
            return false;
        }
        match node.write(field, value) {
            Ok(()) => true,
            Err(e) => {
                debug!("Writing {}.{} failed: {}", node.type_name(), field, e);
                false
            }
        }
    }

    /// Boolean-returning method, with absence read as `false`.
    pub fn flag(&self, node: &NodeRef, method: &str) -> bool {
        self.invoke(node, method, None)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Members a node exposes, for diagnostics. Not cached.
    pub fn describe(&self, node: &NodeRef) -> Vec<Member> {
        node.members()
    }

    fn call(&self, node: &NodeRef, method: &str, arg: Option<SurfaceValue>) -> Option<SurfaceValue> {
        let kind = MemberKind::Method {
            param: arg.as_ref().map(SurfaceValue::kind),
        };
        if !self.resolve(node, method, kind) {
            return None;
        }
        match node.call(method, arg) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Invoking {}.{} failed: {}", node.type_name(), method, e);
                None
            }
        }
    }

    fn resolve(&self, node: &NodeRef, name: &str, kind: MemberKind) -> bool {
        let key = (node.type_name().to_string(), name.to_string(), kind);
        if let Some(present) = self.resolved.get(&key) {
            return *present;
        }

        let present = node
            .members()
            .iter()
            .any(|m| m.name == name && m.kind == kind);
        self.resolved.insert(key, present);
        present
    }
}

#[cfg(test)]
#[path = "accessor_tests.rs"]
mod tests;
