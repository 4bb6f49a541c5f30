use std::time::Duration;

use cdp_adapter::KeyPress;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::TargetError;
use crate::surface::ChatSurface;
use crate::target::ChatTarget;

pub const PICKER_NOT_FOUND: &str = "Model picker not found";
pub const MODEL_NOT_AVAILABLE: &str = "Model not available";

#[derive(Clone, Debug)]
pub struct ModelSelectOptions {
    pub picker_timeout: Duration,
    /// How long the opened menu may take to render its options
    pub menu_timeout: Duration,
}

impl Default for ModelSelectOptions {
    fn default() -> Self {
        Self {
            picker_timeout: Duration::from_secs(8),
            menu_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "selection", rename_all = "snake_case")]
pub enum ModelSelection {
    /// The target has no picker or no model was asked for
    Skipped,
    Selected {
        model: String,
        detected: Vec<String>,
    },
    Unavailable {
        reason: String,
        detected: Vec<String>,
    },
}

impl ModelSelection {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ModelSelection::Unavailable { .. })
    }

    /// Option labels seen in the open menu
    pub fn detected(&self) -> &[String] {
        match self {
            ModelSelection::Skipped => &[],
            ModelSelection::Selected { detected, .. }
            | ModelSelection::Unavailable { detected, .. } => detected,
        }
    }
}

/// Open the target's model picker and choose `model` by its label.
pub async fn select_model(
    surface: &dyn ChatSurface,
    target: &ChatTarget,
    model: &str,
    opts: &ModelSelectOptions,
) -> Result<ModelSelection, TargetError> {
    let model = model.trim();
    let picker_chain = match &target.model_picker {
        Some(chain) if !model.is_empty() => chain,
        _ => return Ok(ModelSelection::Skipped),
    };

    let opened = match surface.wait_for(picker_chain, opts.picker_timeout).await? {
        Some(picker) => surface.click(&picker).await?,
        None => false,
    };
    if !opened {
        warn!(chat = %target.kind, "Model picker not found");
        return Ok(ModelSelection::Unavailable {
            reason: PICKER_NOT_FOUND.to_string(),
            detected: Vec::new(),
        });
    }

    if surface
        .wait_for(&target.model_options, opts.menu_timeout)
        .await?
        .is_none()
    {
        debug!(chat = %target.kind, "Model menu rendered no options");
    }
    let detected = surface.list_texts(&target.model_options).await?;
    debug!(chat = %target.kind, ?detected, "Detected models");

    if let Some(option) = surface.find_text(&target.model_options, model).await? {
        if surface.click(&option).await? {
            info!(chat = %target.kind, model, "Model selected");
            return Ok(ModelSelection::Selected {
                model: model.to_string(),
                detected,
            });
        }
    }

    // Leave the page as we found it.
    surface.press_key(KeyPress::Escape).await?;
    warn!(chat = %target.kind, model, "Model not offered");
    Ok(ModelSelection::Unavailable {
        reason: MODEL_NOT_AVAILABLE.to_string(),
        detected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetKind;
    use crate::testing::ScriptedSurface;

    fn chatgpt() -> ChatTarget {
        ChatTarget::for_kind(TargetKind::ChatGpt)
    }

    #[tokio::test]
    async fn selects_listed_model() {
        let surface = ScriptedSurface::chat().with_models(&["GPT-4o", "o3-mini"]);
        let result = select_model(&surface, &chatgpt(), "o3-mini", &Default::default())
            .await
            .unwrap();
        assert_eq!(
            result,
            ModelSelection::Selected {
                model: "o3-mini".into(),
                detected: vec!["GPT-4o".into(), "o3-mini".into()],
            }
        );
        assert_eq!(surface.selected_model().as_deref(), Some("o3-mini"));
    }

    #[tokio::test]
    async fn missing_model_closes_menu() {
        let surface = ScriptedSurface::chat().with_models(&["GPT-4o"]);
        let result = select_model(&surface, &chatgpt(), "o1", &Default::default())
            .await
            .unwrap();
        assert_eq!(
            result,
            ModelSelection::Unavailable {
                reason: MODEL_NOT_AVAILABLE.into(),
                detected: vec!["GPT-4o".into()],
            }
        );
        assert_eq!(surface.keys(), vec![KeyPress::Escape]);
        assert!(!surface.menu_open());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_picker_is_reported() {
        let surface = ScriptedSurface::chat();
        let result = select_model(&surface, &chatgpt(), "gpt-4o", &Default::default())
            .await
            .unwrap();
        assert_eq!(
            result,
            ModelSelection::Unavailable {
                reason: PICKER_NOT_FOUND.into(),
                detected: vec![],
            }
        );
        assert!(!result.is_ok());
    }

    #[tokio::test]
    async fn skipped_without_picker_or_model() {
        let surface = ScriptedSurface::chat().with_models(&["GPT-4o"]);
        let gemini = ChatTarget::for_kind(TargetKind::Gemini);
        assert_eq!(
            select_model(&surface, &gemini, "gpt-4o", &Default::default())
                .await
                .unwrap(),
            ModelSelection::Skipped
        );
        assert_eq!(
            select_model(&surface, &chatgpt(), "  ", &Default::default())
                .await
                .unwrap(),
            ModelSelection::Skipped
        );
        assert!(surface.clicks().is_empty());
    }
}
