use std::sync::Arc;

use super::*;
use crate::mock::MockNode;
use crate::node::ValueKind;

fn text_area() -> Arc<MockNode> {
    MockNode::builder("JBTextArea")
        .field("text", "draft")
        .setter("setText", ValueKind::Text, "text")
        .getter("getText", "text")
        .returns("isShowing", true)
        .failing("requestFocus", "not displayable")
        .build()
}

#[test]
fn test_invoke_existing_method() {
    let accessor = Accessor::new();
    let node: NodeRef = text_area();
    let value = accessor.invoke(&node, "getText", None);
    assert_eq!(value.and_then(|v| v.as_str().map(str::to_string)), Some("draft".to_string()));
}

#[test]
fn test_invoke_missing_method_is_absent() {
    let accessor = Accessor::new();
    let node: NodeRef = text_area();
    assert!(accessor.invoke(&node, "doClick", None).is_none());
    assert!(!accessor.invoke_void(&node, "doClick", None));
}

#[test]
fn test_invoke_raising_method_is_absent() {
    let accessor = Accessor::new();
    let node: NodeRef = text_area();
    assert!(accessor.invoke(&node, "requestFocus", None).is_none());
    assert!(!accessor.invoke_void(&node, "requestFocus", None));
}

#[test]
fn test_invoke_with_argument_matches_param_kind() {
    let accessor = Accessor::new();
    let mock = text_area();
    let node: NodeRef = mock.clone();

    assert!(accessor.invoke_void(&node, "setText", Some("hello".into())));
    assert_eq!(mock.field("text").and_then(|v| v.as_str().map(str::to_string)), Some("hello".to_string()));

    // Wrong argument kind resolves to a different overload, which does not exist.
    assert!(!accessor.invoke_void(&node, "setText", Some(SurfaceValue::Int(1))));
    // Void setter has no useful return value.
    assert!(accessor.invoke(&node, "setText", Some("again".into())).is_none());
}

#[test]
fn test_fields() {
    let accessor = Accessor::new();
    let mock = text_area();
    let node: NodeRef = mock.clone();

    assert_eq!(
        accessor.get_field(&node, "text").and_then(|v| v.as_str().map(str::to_string)),
        Some("draft".to_string())
    );
    assert!(accessor.get_field(&node, "markdown").is_none());

    assert!(accessor.set_field(&node, "text", "updated".into()));
    assert!(!accessor.set_field(&node, "markdown", "x".into()));
    assert_eq!(mock.field("text").and_then(|v| v.as_str().map(str::to_string)), Some("updated".to_string()));
}

#[test]
fn test_null_field_is_absent() {
    let accessor = Accessor::new();
    let node: NodeRef = MockNode::builder("JLabel").field("text", SurfaceValue::Null).build();
    assert!(accessor.get_field(&node, "text").is_none());
}

#[test]
fn test_flag() {
    let accessor = Accessor::new();
    let node: NodeRef = text_area();
    assert!(accessor.flag(&node, "isShowing"));
    assert!(!accessor.flag(&node, "isVisible"));
    // Non-boolean return is not a flag.
    assert!(!accessor.flag(&node, "getText"));
}

#[test]
fn test_resolution_is_cached_per_type_and_member() {
    let accessor = Accessor::new();
    let mock = text_area();
    let node: NodeRef = mock.clone();

    for _ in 0..10 {
        accessor.invoke(&node, "getText", None);
        accessor.invoke(&node, "doClick", None);
    }
    // One lookup for the hit, one for the cached miss.
    assert_eq!(mock.member_lookups(), 2);
    assert_eq!(accessor.cached_lookups(), 2);
}

#[test]
fn test_cache_is_shared_across_nodes_of_same_type() {
    let accessor = Accessor::new();
    let first = text_area();
    let second = text_area();
    let a: NodeRef = first.clone();
    let b: NodeRef = second.clone();

    accessor.invoke(&a, "getText", None);
    accessor.invoke(&b, "getText", None);

    assert_eq!(first.member_lookups() + second.member_lookups(), 1);
}

#[test]
fn test_describe_lists_members() {
    let accessor = Accessor::new();
    let node: NodeRef = text_area();
    let names: Vec<String> = accessor.describe(&node).iter().map(|m| m.to_string()).collect();
    assert!(names.contains(&"getText()".to_string()));
    assert!(names.contains(&"setText(Text)".to_string()));
    assert!(names.contains(&"text".to_string()));
}
