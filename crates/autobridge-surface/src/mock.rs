//! Scriptable in-memory nodes for exercising surface code without a host.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::SurfaceError;
use crate::node::{Member, NodeRef, SurfaceProvider, SurfaceValue, TargetNode, ValueKind};

type MethodFn = Arc<dyn Fn(Option<SurfaceValue>) -> Result<SurfaceValue, SurfaceError> + Send + Sync>;

#[derive(Clone)]
enum MockMethod {
    Returns(SurfaceValue),
    ReadsField(String),
    WritesField(String),
    Fails(String),
    Custom(MethodFn),
}

/// In-memory [`TargetNode`] with scripted fields, methods and children.
pub struct MockNode {
    type_name: String,
    fields: Mutex<HashMap<String, SurfaceValue>>,
    methods: HashMap<String, (Option<ValueKind>, MockMethod)>,
    children: Mutex<Option<Vec<NodeRef>>>,
    broken_children: bool,
    member_lookups: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockNode {
    pub fn builder(type_name: impl Into<String>) -> MockNodeBuilder {
        MockNodeBuilder {
            type_name: type_name.into(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            children: None,
            broken_children: false,
        }
    }

    /// Number of times `members()` was queried.
    pub fn member_lookups(&self) -> usize {
        self.member_lookups.load(Ordering::SeqCst)
    }

    /// Names of methods invoked so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Current value of a field.
    pub fn field(&self, name: &str) -> Option<SurfaceValue> {
        self.fields.lock().get(name).cloned()
    }

    /// Replace the child collection.
    pub fn set_children(&self, children: Vec<NodeRef>) {
        *self.children.lock() = Some(children);
    }

    /// Append a child, turning the node into a container if needed.
    pub fn push_child(&self, child: NodeRef) {
        self.children.lock().get_or_insert_with(Vec::new).push(child);
    }
}

impl TargetNode for MockNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<Member> {
        self.member_lookups.fetch_add(1, Ordering::SeqCst);
        let mut members: Vec<Member> = self.fields.lock().keys().map(Member::field).collect();
        members.extend(
            self.methods
                .iter()
                .map(|(name, (param, _))| Member::method(name.clone(), *param)),
        );
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    fn children(&self) -> Result<Option<Vec<NodeRef>>, SurfaceError> {
        if self.broken_children {
            return Err(SurfaceError::ChildrenUnavailable(self.type_name.clone()));
        }
        Ok(self.children.lock().clone())
    }

    fn call(&self, method: &str, arg: Option<SurfaceValue>) -> Result<SurfaceValue, SurfaceError> {
        self.calls.lock().push(method.to_string());
        let (_, behaviour) =
            self.methods
                .get(method)
                .ok_or_else(|| SurfaceError::MemberNotFound {
                    type_name: self.type_name.clone(),
                    member: method.to_string(),
                })?;

        match behaviour {
            MockMethod::Returns(value) => Ok(value.clone()),
            MockMethod::ReadsField(field) => self.read(field),
            MockMethod::WritesField(field) => {
                let value = arg.unwrap_or(SurfaceValue::Null);
                self.fields.lock().insert(field.clone(), value);
                Ok(SurfaceValue::Null)
            }
            MockMethod::Fails(reason) => Err(SurfaceError::access(method, reason.clone())),
            MockMethod::Custom(f) => f(arg),
        }
    }

    fn read(&self, field: &str) -> Result<SurfaceValue, SurfaceError> {
        self.fields
            .lock()
            .get(field)
            .cloned()
            .ok_or_else(|| SurfaceError::MemberNotFound {
                type_name: self.type_name.clone(),
                member: field.to_string(),
            })
    }

    fn write(&self, field: &str, value: SurfaceValue) -> Result<(), SurfaceError> {
        let mut fields = self.fields.lock();
        match fields.get_mut(field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SurfaceError::MemberNotFound {
                type_name: self.type_name.clone(),
                member: field.to_string(),
            }),
        }
    }
}

/// Builder for [`MockNode`].
pub struct MockNodeBuilder {
    type_name: String,
    fields: HashMap<String, SurfaceValue>,
    methods: HashMap<String, (Option<ValueKind>, MockMethod)>,
    children: Option<Vec<NodeRef>>,
    broken_children: bool,
}

impl MockNodeBuilder {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<SurfaceValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Zero-argument method returning a fixed value.
    pub fn returns(mut self, method: impl Into<String>, value: impl Into<SurfaceValue>) -> Self {
        self.methods
            .insert(method.into(), (None, MockMethod::Returns(value.into())));
        self
    }

    /// Zero-argument method returning the current value of a field.
    pub fn getter(mut self, method: impl Into<String>, field: impl Into<String>) -> Self {
        self.methods
            .insert(method.into(), (None, MockMethod::ReadsField(field.into())));
        self
    }

    /// One-argument method storing its argument in a field.
    pub fn setter(
        mut self,
        method: impl Into<String>,
        param: ValueKind,
        field: impl Into<String>,
    ) -> Self {
        self.methods.insert(
            method.into(),
            (Some(param), MockMethod::WritesField(field.into())),
        );
        self
    }

    /// Method that always raises.
    pub fn failing(mut self, method: impl Into<String>, reason: impl Into<String>) -> Self {
        self.methods
            .insert(method.into(), (None, MockMethod::Fails(reason.into())));
        self
    }

    /// Method with custom behaviour.
    pub fn method<F>(mut self, method: impl Into<String>, param: Option<ValueKind>, f: F) -> Self
    where
        F: Fn(Option<SurfaceValue>) -> Result<SurfaceValue, SurfaceError> + Send + Sync + 'static,
    {
        self.methods
            .insert(method.into(), (param, MockMethod::Custom(Arc::new(f))));
        self
    }

    pub fn child(mut self, child: NodeRef) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Mark the node as a container with no children yet.
    pub fn container(mut self) -> Self {
        self.children.get_or_insert_with(Vec::new);
        self
    }

    /// Make child enumeration raise.
    pub fn broken_children(mut self) -> Self {
        self.broken_children = true;
        self
    }

    pub fn build(self) -> Arc<MockNode> {
        Arc::new(MockNode {
            type_name: self.type_name,
            fields: Mutex::new(self.fields),
            methods: self.methods,
            children: Mutex::new(self.children),
            broken_children: self.broken_children,
            member_lookups: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }
}

/// Provider whose root can be swapped at will.
#[derive(Default)]
pub struct StaticSurface {
    root: Mutex<Option<NodeRef>>,
}

impl StaticSurface {
    pub fn new(root: NodeRef) -> Self {
        Self {
            root: Mutex::new(Some(root)),
        }
    }

    pub fn set_root(&self, root: Option<NodeRef>) {
        *self.root.lock() = root;
    }
}

impl SurfaceProvider for StaticSurface {
    fn root(&self) -> Option<NodeRef> {
        self.root.lock().clone()
    }
}
