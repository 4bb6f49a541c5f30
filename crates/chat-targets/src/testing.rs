//! In-memory chat tab for exercising the relay flows without a browser.

use std::sync::{Arc, Mutex, MutexGuard};

use action_locator::{
    normalize_label, ElementKind, ElementRole, LocatedElement, LocatorError, SelectorChain,
};
use async_trait::async_trait;
use cdp_adapter::{KeyPress, PageId};
use tokio_util::sync::CancellationToken;
use tool_fill_input::{fill_verified, ApplyAck, FillPolicy, FillPort, FillReport, FillStrategy};

use crate::errors::TargetError;
use crate::surface::{ChatSurface, SurfaceOpener};

struct State {
    input_kind: Option<ElementKind>,
    input: String,
    accepts: Vec<FillStrategy>,
    picker: bool,
    models: Vec<String>,
    menu_open: bool,
    selected: Option<String>,
    /// Lookups that miss before the send button renders; `None` = never
    send_button_misses: Option<u32>,
    click_sends: bool,
    enter_sends: bool,
    sent: Vec<String>,
    keys: Vec<KeyPress>,
    clicks: Vec<ElementRole>,
}

/// A chat page whose composer, send button and model menu behave as
/// configured.
pub struct ScriptedSurface {
    page: PageId,
    state: Mutex<State>,
}

impl ScriptedSurface {
    /// Contenteditable composer that accepts every strategy, a working send
    /// button, no model picker.
    pub fn chat() -> Self {
        Self {
            page: PageId::new(),
            state: Mutex::new(State {
                input_kind: Some(ElementKind::ContentEditable),
                input: String::new(),
                accepts: vec![
                    FillStrategy::NativeSetter,
                    FillStrategy::ExecCommand,
                    FillStrategy::ClipboardPaste,
                    FillStrategy::CdpInsertText,
                    FillStrategy::DirectDom,
                ],
                picker: false,
                models: Vec::new(),
                menu_open: false,
                selected: None,
                send_button_misses: Some(0),
                click_sends: true,
                enter_sends: true,
                sent: Vec::new(),
                keys: Vec::new(),
                clicks: Vec::new(),
            }),
        }
    }

    fn edit(mut self, apply: impl FnOnce(&mut State)) -> Self {
        match self.state.get_mut() {
            Ok(state) => apply(state),
            Err(poisoned) => apply(poisoned.into_inner()),
        }
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_models(self, models: &[&str]) -> Self {
        self.edit(|s| {
            s.picker = true;
            s.models = models.iter().map(|m| m.to_string()).collect();
        })
    }

    pub fn with_input_kind(self, kind: ElementKind) -> Self {
        self.edit(|s| s.input_kind = Some(kind))
    }

    pub fn with_input_text(self, text: &str) -> Self {
        self.edit(|s| s.input = text.to_string())
    }

    pub fn without_input(self) -> Self {
        self.edit(|s| s.input_kind = None)
    }

    /// Only these strategies change the composer; the rest are ignored.
    pub fn accepting(self, strategies: &[FillStrategy]) -> Self {
        self.edit(|s| s.accepts = strategies.to_vec())
    }

    pub fn send_button_after(self, misses: u32) -> Self {
        self.edit(|s| s.send_button_misses = Some(misses))
    }

    pub fn without_send_button(self) -> Self {
        self.edit(|s| s.send_button_misses = None)
    }

    pub fn click_does_not_send(self) -> Self {
        self.edit(|s| s.click_sends = false)
    }

    pub fn enter_does_not_send(self) -> Self {
        self.edit(|s| s.enter_sends = false)
    }

    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn keys(&self) -> Vec<KeyPress> {
        self.state().keys.clone()
    }

    pub fn clicks(&self) -> Vec<ElementRole> {
        self.state().clicks.clone()
    }

    pub fn selected_model(&self) -> Option<String> {
        self.state().selected.clone()
    }

    pub fn menu_open(&self) -> bool {
        self.state().menu_open
    }

    pub fn input_text(&self) -> Option<String> {
        let state = self.state();
        state.input_kind.map(|_| state.input.clone())
    }

    fn element(&self, role: ElementRole, kind: ElementKind, text: &str) -> LocatedElement {
        LocatedElement {
            page: self.page,
            role,
            handle: format!("scripted-{}", role),
            selector: format!("[data-scripted=\"{}\"]", role),
            candidate: 0,
            kind,
            shadow_depth: 0,
            visible: true,
            enabled: true,
            text: text.to_string(),
        }
    }

    fn input_element(&self) -> Option<LocatedElement> {
        let kind = self.state().input_kind?;
        Some(self.element(ElementRole::MessageInput, kind, ""))
    }

    fn submit(state: &mut State) {
        if !state.input.trim().is_empty() {
            let message = std::mem::take(&mut state.input);
            state.sent.push(message);
        }
    }
}

struct ScriptedInput<'a>(&'a ScriptedSurface);

#[async_trait]
impl FillPort for ScriptedInput<'_> {
    async fn locate(&self) -> Result<Option<LocatedElement>, LocatorError> {
        Ok(self.0.input_element())
    }

    async fn apply(
        &self,
        _element: &LocatedElement,
        strategy: FillStrategy,
        text: &str,
    ) -> Result<ApplyAck, LocatorError> {
        let mut state = self.0.state();
        if state.accepts.contains(&strategy) {
            state.input = text.to_string();
        }
        Ok(ApplyAck::Applied)
    }

    async fn read_back(&self, _element: &LocatedElement) -> Result<Option<String>, LocatorError> {
        Ok(self.0.input_text())
    }
}

#[async_trait]
impl ChatSurface for ScriptedSurface {
    fn page(&self) -> PageId {
        self.page
    }

    async fn find(&self, chain: &SelectorChain) -> Result<Option<LocatedElement>, TargetError> {
        let found = match chain.role {
            ElementRole::MessageInput => self.input_element(),
            ElementRole::SendButton => {
                let mut state = self.state();
                match state.send_button_misses {
                    Some(0) => Some(self.element(ElementRole::SendButton, ElementKind::Button, "")),
                    Some(n) => {
                        state.send_button_misses = Some(n - 1);
                        None
                    }
                    None => None,
                }
            }
            ElementRole::ModelPicker => {
                let picker = self.state().picker;
                picker.then(|| self.element(ElementRole::ModelPicker, ElementKind::Button, ""))
            }
            ElementRole::ModelOption => {
                let first = {
                    let state = self.state();
                    if state.menu_open {
                        state.models.first().cloned()
                    } else {
                        None
                    }
                };
                first.map(|label| self.element(ElementRole::ModelOption, ElementKind::Other, &label))
            }
            ElementRole::Content => None,
        };
        Ok(found)
    }

    async fn find_text(
        &self,
        chain: &SelectorChain,
        text: &str,
    ) -> Result<Option<LocatedElement>, TargetError> {
        if chain.role != ElementRole::ModelOption {
            return Ok(None);
        }
        let wanted = normalize_label(text);
        let hit = {
            let state = self.state();
            if !state.menu_open {
                return Ok(None);
            }
            state
                .models
                .iter()
                .find(|label| normalize_label(label) == wanted)
                .cloned()
        };
        Ok(hit.map(|label| self.element(ElementRole::ModelOption, ElementKind::Other, &label)))
    }

    async fn list_texts(&self, chain: &SelectorChain) -> Result<Vec<String>, TargetError> {
        let state = self.state();
        if chain.role == ElementRole::ModelOption && state.menu_open {
            Ok(state.models.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn click(&self, element: &LocatedElement) -> Result<bool, TargetError> {
        let mut state = self.state();
        state.clicks.push(element.role);
        match element.role {
            ElementRole::ModelPicker => state.menu_open = true,
            ElementRole::ModelOption => {
                state.selected = Some(element.text.clone());
                state.menu_open = false;
            }
            ElementRole::SendButton if state.click_sends => Self::submit(&mut state),
            _ => {}
        }
        Ok(true)
    }

    async fn press_key(&self, key: KeyPress) -> Result<(), TargetError> {
        let mut state = self.state();
        state.keys.push(key);
        match key {
            KeyPress::Escape => state.menu_open = false,
            KeyPress::Enter if state.enter_sends => Self::submit(&mut state),
            KeyPress::Enter => {}
        }
        Ok(())
    }

    async fn fill(
        &self,
        _chain: &SelectorChain,
        text: &str,
        policy: &FillPolicy,
        cancel: &CancellationToken,
    ) -> Result<FillReport, TargetError> {
        Ok(fill_verified(&ScriptedInput(self), text, policy, cancel).await?)
    }

    async fn read_text(&self, chain: &SelectorChain) -> Result<Option<String>, TargetError> {
        match chain.role {
            ElementRole::MessageInput => Ok(self.input_text()),
            _ => Ok(None),
        }
    }
}

/// Hands out one shared [`ScriptedSurface`] and records the URLs asked for.
pub struct ScriptedOpener {
    surface: Arc<ScriptedSurface>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedOpener {
    pub fn new(surface: Arc<ScriptedSurface>) -> Self {
        Self {
            surface,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SurfaceOpener for ScriptedOpener {
    async fn open(&self, url: &str) -> Result<Arc<dyn ChatSurface>, TargetError> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        let surface: Arc<dyn ChatSurface> = self.surface.clone();
        Ok(surface)
    }
}
