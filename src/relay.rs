//! One send: compose, open the chat, pick the model, fill, submit.

use std::sync::Arc;

use chat_targets::{
    auto_send, select_model, ChatTarget, ModelSelection, Notification, Notifier, SendAttempt,
    SendPolicy, SurfaceOpener,
};
use chatrelay_core_types::PageSnapshot;
use message_compose::{format_for_page, Composition, SendMode};
use serde::Serialize;
use settings_store::{Settings, SettingsStore};
use tokio_util::sync::CancellationToken;
use tool_fill_input::{FillOutcome, FillPolicy, FillReport};
use tracing::{debug, info, instrument, warn};

use crate::config::RelayTimeouts;
use crate::errors::RelayError;

/// Used when the stored retry interval is zero.
pub const FALLBACK_RETRY_INTERVAL_MS: u64 = 500;

#[derive(Clone, Debug)]
pub struct SendRequest {
    /// Target key, `chatgpt` or `gemini`
    pub target: String,
    pub model: Option<String>,
    pub mode: SendMode,
    /// Prompt with template placeholders already resolved
    pub prompt: String,
    pub auto_send: bool,
    pub page: PageSnapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendStatus {
    /// Over the size limit with the abort strategy; nothing was opened
    Aborted,
    ModelUnavailable,
    InputMissing,
    InputUnverified,
    /// Filled and verified, left for the user to submit
    InputOnly,
    Sent,
    SendFailed,
}

impl SendStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SendStatus::InputOnly | SendStatus::Sent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Aborted => "aborted",
            SendStatus::ModelUnavailable => "model-unavailable",
            SendStatus::InputMissing => "input-missing",
            SendStatus::InputUnverified => "input-unverified",
            SendStatus::InputOnly => "input-only",
            SendStatus::Sent => "sent",
            SendStatus::SendFailed => "send-failed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SendOutcome {
    pub status: SendStatus,
    pub truncated: bool,
    /// Characters in the message before any truncation
    pub chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send: Option<SendAttempt>,
    pub detected_models: Vec<String>,
}

impl SendOutcome {
    fn new(status: SendStatus, composition: &Composition) -> Self {
        Self {
            status,
            truncated: composition.size.truncated,
            chars: composition.chars,
            url: None,
            model: None,
            fill: None,
            send: None,
            detected_models: Vec::new(),
        }
    }
}

/// Prompt for a send: an explicit prompt wins, otherwise the named (or
/// selected) template. Placeholders are filled from `page` either way.
pub fn resolve_prompt(
    settings: &Settings,
    page: &PageSnapshot,
    template_id: Option<&str>,
    prompt: Option<&str>,
) -> Result<String, RelayError> {
    if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
        return Ok(format_for_page(prompt, page));
    }
    let template = match template_id {
        Some(id) => settings
            .template(id)
            .ok_or_else(|| RelayError::UnknownTemplate(id.to_string()))?,
        None => settings
            .current_template()
            .ok_or_else(|| RelayError::UnknownTemplate(settings.selected_template_id.clone()))?,
    };
    debug!(template = %template.id, "Using template");
    Ok(format_for_page(&template.body, page))
}

pub struct Relay {
    opener: Arc<dyn SurfaceOpener>,
    store: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    timeouts: RelayTimeouts,
}

impl Relay {
    pub fn new(
        opener: Arc<dyn SurfaceOpener>,
        store: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
        timeouts: RelayTimeouts,
    ) -> Self {
        Self {
            opener,
            store,
            notifier,
            timeouts,
        }
    }

    #[instrument(skip_all, fields(chat = %request.target, auto_send = request.auto_send))]
    pub async fn execute_send(
        &self,
        request: SendRequest,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, RelayError> {
        let settings = self.store.load().await?;
        let target = ChatTarget::resolve(&request.target)?;

        let composition = Composition::new(
            request.prompt.as_str(),
            request.mode,
            &request.page,
            settings.max_characters,
            settings.truncate_strategy,
        );
        if composition.size.aborted {
            warn!(
                chars = composition.chars,
                limit = settings.max_characters,
                "Message over the size limit"
            );
            self.notifier.notify(Notification::size_limit_exceeded());
            return Ok(SendOutcome::new(SendStatus::Aborted, &composition));
        }
        let mut outcome = SendOutcome::new(SendStatus::InputOnly, &composition);

        let url = target.new_chat_url(settings.gemini_account_index);
        info!(chat = %target.kind, url = %url, chars = composition.chars, "Opening chat");
        let surface = self.opener.open(&url).await?;
        outcome.url = Some(url);

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if let (true, Some(model)) = (target.supports_models(), model) {
            let selection =
                select_model(surface.as_ref(), &target, model, &self.timeouts.model_select())
                    .await?;
            outcome.detected_models = selection.detected().to_vec();
            self.record_detected(&settings, &outcome.detected_models).await?;

            let unavailable = match &selection {
                ModelSelection::Unavailable { reason, .. } => Some(reason.clone()),
                _ => None,
            };
            outcome.model = Some(selection);
            if let Some(reason) = unavailable {
                self.notifier.notify(Notification::model_unavailable(&reason));
                outcome.status = SendStatus::ModelUnavailable;
                return Ok(outcome);
            }
        }

        let policy = self.fill_policy(&settings);
        let report = surface
            .fill(&target.input, &composition.size.text, &policy, cancel)
            .await?;
        let status = match &report.outcome {
            FillOutcome::Verified { strategy, attempt } => {
                info!(chat = %target.kind, %strategy, attempt, "Message in composer");
                None
            }
            FillOutcome::TargetMissing => {
                self.notifier.notify(Notification::input_failed());
                Some(SendStatus::InputMissing)
            }
            FillOutcome::Unverified { .. } => {
                self.notifier.notify(Notification::input_unverified());
                Some(SendStatus::InputUnverified)
            }
        };
        outcome.fill = Some(report);
        if let Some(status) = status {
            outcome.status = status;
            return Ok(outcome);
        }

        if !request.auto_send {
            return Ok(outcome);
        }

        let mut send_policy = SendPolicy::new(settings.retry_count, retry_interval(&settings));
        send_policy.settle = self.timeouts.send_settle();
        let attempt = auto_send(surface.as_ref(), &target, &send_policy).await?;
        outcome.status = if attempt.is_sent() {
            SendStatus::Sent
        } else {
            self.notifier.notify(Notification::auto_send_failed());
            SendStatus::SendFailed
        };
        outcome.send = Some(attempt);
        Ok(outcome)
    }

    fn fill_policy(&self, settings: &Settings) -> FillPolicy {
        FillPolicy {
            settle_ms: self.timeouts.fill_settle_ms,
            ..FillPolicy::default()
        }
        .with_attempts(settings.fill_attempts)
        .with_retry_delay(retry_interval(settings))
    }

    async fn record_detected(
        &self,
        settings: &Settings,
        detected: &[String],
    ) -> Result<(), RelayError> {
        if !settings.model_detection_beta_enabled || detected.is_empty() {
            return Ok(());
        }
        if settings.detected_models.as_slice() == detected {
            return Ok(());
        }
        let detected = detected.to_vec();
        debug!(?detected, "Recording detected models");
        self.store
            .update(move |s| s.detected_models = detected)
            .await?;
        Ok(())
    }
}

fn retry_interval(settings: &Settings) -> u64 {
    match settings.retry_interval_ms {
        0 => FALLBACK_RETRY_INTERVAL_MS,
        ms => ms,
    }
}
