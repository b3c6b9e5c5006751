//! Introspective access to the automated target surface.
//!
//! The automated application is reachable only through its live object graph.
//! This crate provides:
//! - [`TargetNode`]: the opaque node contract a host embedding implements
//! - [`TreeSearch`]: depth-first search over that graph
//! - [`Accessor`]: cached, absent-on-miss invoke/get/set
//! - [`extract_display_text`]: the text-extraction fallback chain
//! - [`UiContext`]: confinement of every surface call to one execution context
//! - [`ChatSurface`]: the chat-panel operations the bridge drives, with an
//!   introspective implementation in [`IntrospectedChat`]
//! - [`RecordingSurface`]: on-demand recording of the calls made on a surface

mod accessor;
mod chat;
mod error;
mod introspect;
pub mod mock;
mod node;
mod recorder;
mod search;
mod text;
mod ui;

pub use accessor::Accessor;
pub use chat::{ChatMode, ChatSurface, InspectTarget};
pub use error::SurfaceError;
pub use introspect::IntrospectedChat;
pub use node::{
    DetachedSurface, Member, MemberKind, NodeRef, SurfaceProvider, SurfaceValue, TargetNode,
    ValueKind,
};
pub use recorder::{MAX_RECORDED_EVENTS, RecordedEvents, RecordingSurface};
pub use search::{TreeSearch, TypeHistogram, render_histogram};
pub use text::{decode_entities, extract_display_text, strip_markup};
pub use ui::{DedicatedUiThread, InlineDispatch, UiContext, UiDispatch, UiJob};
