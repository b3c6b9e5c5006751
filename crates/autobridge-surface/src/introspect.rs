//! [`ChatSurface`] implemented by introspecting the live chat panel.
//!
//! Every node access happens inside a closure run on the [`UiContext`]; no
//! [`NodeRef`] ever leaves the confinement context.

use std::sync::Arc;

use async_trait::async_trait;
use autobridge_config::SurfaceConfig;
use tracing::debug;

use crate::accessor::Accessor;
use crate::chat::{ChatMode, ChatSurface, InspectTarget};
use crate::error::SurfaceError;
use crate::node::{NodeRef, SurfaceProvider, SurfaceValue};
use crate::search::{TreeSearch, TypeHistogram};
use crate::text::extract_display_text;
use crate::ui::UiContext;

/// Chat panel driven through node-type selectors.
pub struct IntrospectedChat {
    ui: UiContext,
    provider: Arc<dyn SurfaceProvider>,
    accessor: Arc<Accessor>,
    selectors: Arc<SurfaceConfig>,
}

impl IntrospectedChat {
    pub fn new(ui: UiContext, provider: Arc<dyn SurfaceProvider>, selectors: SurfaceConfig) -> Self {
        Self {
            ui,
            provider,
            accessor: Arc::new(Accessor::new()),
            selectors: Arc::new(selectors),
        }
    }

    pub fn accessor(&self) -> &Arc<Accessor> {
        &self.accessor
    }

    /// Run `f` against the panel root on the UI context.
    async fn with_root<R, F>(&self, f: F) -> Result<R, SurfaceError>
    where
        F: FnOnce(&Accessor, &SurfaceConfig, NodeRef) -> Result<R, SurfaceError> + Send + 'static,
        R: Send + 'static,
    {
        let provider = self.provider.clone();
        let accessor = self.accessor.clone();
        let selectors = self.selectors.clone();
        self.ui
            .run(move || {
                let root = provider
                    .root()
                    .ok_or_else(|| SurfaceError::Unavailable("chat panel not found".to_string()))?;
                f(&accessor, &selectors, root)
            })
            .await?
    }
}

fn find(root: &NodeRef, types: &[String]) -> Option<NodeRef> {
    TreeSearch::find_first(Some(root), |n| TreeSearch::type_matches(n, types))
}

fn is_shown(accessor: &Accessor, node: &NodeRef) -> bool {
    accessor
        .invoke(node, "isShowing", None)
        .or_else(|| accessor.invoke(node, "isVisible", None))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn value_label(accessor: &Accessor, value: &SurfaceValue) -> Option<String> {
    match value {
        SurfaceValue::Text(s) => Some(s.trim().to_string()),
        SurfaceValue::Node(node) => extract_display_text(accessor, node).or_else(|| {
            accessor
                .invoke(node, "getName", None)
                .and_then(|v| v.as_str().map(str::to_string))
        }),
        _ => None,
    }
}

/// Labels of a combo-box-like control, in index order.
fn combo_items(accessor: &Accessor, combo: &NodeRef) -> Vec<String> {
    let count = accessor
        .invoke(combo, "getItemCount", None)
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    (0..count)
        .map(|i| {
            accessor
                .invoke(combo, "getItemAt", Some(SurfaceValue::Int(i)))
                .and_then(|v| value_label(accessor, &v))
                .unwrap_or_default()
        })
        .collect()
}

/// Select the item whose label equals `label` (case-insensitive), falling
/// back to the first item containing it.
fn select_item(accessor: &Accessor, combo: &NodeRef, label: &str) -> bool {
    let items = combo_items(accessor, combo);
    let wanted = label.to_lowercase();
    let index = items
        .iter()
        .position(|item| item.to_lowercase() == wanted)
        .or_else(|| items.iter().position(|item| item.to_lowercase().contains(&wanted)));

    match index {
        Some(i) => accessor.invoke_void(combo, "setSelectedIndex", Some(SurfaceValue::Int(i as i64))),
        None => {
            debug!("No item labelled {:?} among {:?}", label, items);
            false
        }
    }
}

fn describe(accessor: &Accessor, node: &NodeRef, what: InspectTarget) -> String {
    let mut report = format!("{}: {}\n", what, node.type_name());

    let members: Vec<String> = accessor.describe(node).iter().map(|m| m.to_string()).collect();
    report.push_str(&format!("members: {}\n", members.join(", ")));

    match what {
        InspectTarget::Input => {
            let text = extract_display_text(accessor, node).unwrap_or_default();
            report.push_str(&format!("text: {:?}\n", text));
        }
        InspectTarget::ChatMode | InspectTarget::Models => {
            let items = combo_items(accessor, node);
            let selected = accessor
                .invoke(node, "getSelectedItem", None)
                .and_then(|v| value_label(accessor, &v));
            report.push_str(&format!("items: [{}]\n", items.join(", ")));
            if let Some(selected) = selected {
                report.push_str(&format!("selected: {}\n", selected));
            }
        }
    }
    report
}

#[async_trait]
impl ChatSurface for IntrospectedChat {
    async fn submit_prompt(&self, prompt: &str) -> Result<bool, SurfaceError> {
        let prompt = prompt.to_string();
        self.with_root(move |accessor, selectors, root| {
            let Some(input) = find(&root, &selectors.input_types) else {
                debug!("No prompt input found");
                return Ok(false);
            };
            let placed = accessor.invoke_void(&input, "setText", Some(prompt.clone().into()))
                || accessor.set_field(&input, "text", prompt.into());
            if !placed {
                return Ok(false);
            }

            match find(&root, &selectors.submit_types) {
                Some(button) => Ok(accessor.invoke_void(&button, "doClick", None)),
                None => {
                    debug!("No submit control found");
                    Ok(false)
                }
            }
        })
        .await
    }

    async fn is_generating(&self) -> Result<bool, SurfaceError> {
        self.with_root(|accessor, selectors, root| {
            let stops = TreeSearch::find_all(
                Some(&root),
                |n| TreeSearch::type_matches(n, &selectors.stop_types),
                false,
            );
            Ok(stops.iter().any(|n| is_shown(accessor, n)))
        })
        .await
    }

    async fn response_count(&self) -> Result<usize, SurfaceError> {
        self.with_root(|_, selectors, root| {
            let responses = TreeSearch::find_all(
                Some(&root),
                |n| TreeSearch::type_matches(n, &selectors.response_types),
                false,
            );
            Ok(responses.len())
        })
        .await
    }

    async fn latest_response(&self) -> Result<Option<String>, SurfaceError> {
        self.with_root(|accessor, selectors, root| {
            let responses = TreeSearch::find_all(
                Some(&root),
                |n| TreeSearch::type_matches(n, &selectors.response_types),
                false,
            );
            Ok(responses
                .iter()
                .rev()
                .find_map(|n| extract_display_text(accessor, n)))
        })
        .await
    }

    async fn set_chat_mode(&self, mode: ChatMode) -> Result<bool, SurfaceError> {
        self.with_root(move |accessor, selectors, root| {
            Ok(find(&root, &selectors.chat_mode_types)
                .is_some_and(|combo| select_item(accessor, &combo, mode.label())))
        })
        .await
    }

    async fn select_model(&self, label: &str) -> Result<bool, SurfaceError> {
        let label = label.to_string();
        self.with_root(move |accessor, selectors, root| {
            Ok(find(&root, &selectors.model_picker_types)
                .is_some_and(|picker| select_item(accessor, &picker, &label)))
        })
        .await
    }

    async fn new_session(&self) -> Result<bool, SurfaceError> {
        self.with_root(|accessor, selectors, root| {
            Ok(find(&root, &selectors.new_session_types)
                .is_some_and(|button| accessor.invoke_void(&button, "doClick", None)))
        })
        .await
    }

    async fn diagnose(&self) -> Result<TypeHistogram, SurfaceError> {
        self.with_root(|_, selectors, root| {
            Ok(TreeSearch::collect_type_histogram(
                Some(&root),
                selectors.diagnostics_prefix.as_deref(),
            ))
        })
        .await
    }

    async fn inspect(&self, target: InspectTarget) -> Result<String, SurfaceError> {
        self.with_root(move |accessor, selectors, root| {
            let types = match target {
                InspectTarget::ChatMode => &selectors.chat_mode_types,
                InspectTarget::Models => &selectors.model_picker_types,
                InspectTarget::Input => &selectors.input_types,
            };
            Ok(match find(&root, types) {
                Some(node) => describe(accessor, &node, target),
                None => format!("no {} found (looked for {})\n", target, types.join(", ")),
            })
        })
        .await
    }
}

#[cfg(test)]
#[path = "introspect_tests.rs"]
mod tests;
