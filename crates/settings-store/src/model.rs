use message_compose::{SendMode, TruncateStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const DEFAULT_ALLOWED_MODELS: [&str; 6] =
    ["gpt-4o", "gpt-4o-mini", "o1", "o1-mini", "o3-mini", "o3-mini-high"];

/// How page text is captured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Main article region when there is one, else the whole body
    #[default]
    ReadabilityFirst,
    /// Whole body text
    Raw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelAvailabilityMode {
    #[default]
    Auto,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub body: String,
}

impl Template {
    /// Blank ids get a fresh uuid and blank names become "Untitled".
    pub fn new(id: Option<&str>, name: &str, body: &str) -> Self {
        let id = id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = match name.trim() {
            "" => "Untitled".to_string(),
            trimmed => trimmed.to_string(),
        };
        Self {
            id,
            name,
            body: body.to_string(),
        }
    }

    fn builtin() -> Vec<Template> {
        vec![
            Template {
                id: "default".into(),
                name: "Summarize the page".into(),
                body: "Please summarize the main points from {title} ({url}).".into(),
            },
            Template {
                id: "code".into(),
                name: "Explain the code".into(),
                body: "Explain the code found at {url} focusing on purpose, flow, and risks."
                    .into(),
            },
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub auto_send: bool,
    pub send_mode: SendMode,
    pub target: String,
    pub model: String,
    pub max_characters: usize,
    pub truncate_strategy: TruncateStrategy,
    pub retry_count: u32,
    pub retry_interval_ms: u64,
    /// Verified-fill attempts before giving up on the composer
    pub fill_attempts: u32,
    pub extraction_mode: ExtractionMode,
    pub domain_exceptions_readability: Vec<String>,
    pub domain_exceptions_raw: Vec<String>,
    pub model_availability_mode: ModelAvailabilityMode,
    pub theme: String,
    pub selected_template_id: String,
    pub prompt_draft: String,
    pub gemini_account_index: u32,
    pub message_override: String,
    pub detected_models: Vec<String>,
    pub model_detection_beta_enabled: bool,
    pub allowed_models_manual: Vec<String>,
    pub allowed_models_auto: Vec<String>,
    pub allowed_models: Vec<String>,
    pub templates: Vec<Template>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_send: false,
            send_mode: SendMode::Url,
            target: "chatgpt".into(),
            model: "gpt-4o".into(),
            max_characters: 12_000,
            truncate_strategy: TruncateStrategy::Truncate,
            retry_count: 1,
            retry_interval_ms: 800,
            fill_attempts: 3,
            extraction_mode: ExtractionMode::ReadabilityFirst,
            domain_exceptions_readability: Vec::new(),
            domain_exceptions_raw: Vec::new(),
            model_availability_mode: ModelAvailabilityMode::Auto,
            theme: "light".into(),
            selected_template_id: "default".into(),
            prompt_draft: String::new(),
            gemini_account_index: 0,
            message_override: String::new(),
            detected_models: Vec::new(),
            model_detection_beta_enabled: false,
            allowed_models_manual: Vec::new(),
            allowed_models_auto: Vec::new(),
            allowed_models: DEFAULT_ALLOWED_MODELS.iter().map(|m| m.to_string()).collect(),
            templates: Template::builtin(),
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Fill derived lists and restore required defaults.
    pub fn normalize(&mut self) {
        if self.templates.is_empty() {
            self.templates = Template::builtin();
        }
        if self.allowed_models_manual.is_empty() {
            self.allowed_models_manual = if self.allowed_models.is_empty() {
                DEFAULT_ALLOWED_MODELS.iter().map(|m| m.to_string()).collect()
            } else {
                self.allowed_models.clone()
            };
        }
        if self.allowed_models_auto.is_empty() {
            self.allowed_models_auto = self.allowed_models_manual.clone();
        }
        self.allowed_models = self.allowed_models_manual.clone();
    }

    /// Models offered for selection right now.
    pub fn effective_allowed_models(&self) -> Vec<String> {
        match self.model_availability_mode {
            ModelAvailabilityMode::Auto => {
                if self.model_detection_beta_enabled && !self.detected_models.is_empty() {
                    self.detected_models.clone()
                } else {
                    self.allowed_models_auto.clone()
                }
            }
            ModelAvailabilityMode::Manual => self.allowed_models_manual.clone(),
        }
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// The selected template, falling back to the first one.
    pub fn current_template(&self) -> Option<&Template> {
        self.template(&self.selected_template_id)
            .or_else(|| self.templates.first())
    }

    /// Extraction mode forced for `host` by a domain exception, if any.
    pub fn extraction_override(&self, host: &str) -> Option<ExtractionMode> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        let hit = |list: &[String]| list.iter().any(|entry| domain_matches(&host, entry));
        if hit(&self.domain_exceptions_raw) {
            Some(ExtractionMode::Raw)
        } else if hit(&self.domain_exceptions_readability) {
            Some(ExtractionMode::ReadabilityFirst)
        } else {
            None
        }
    }
}

fn domain_matches(host: &str, entry: &str) -> bool {
    let entry = entry.trim().trim_start_matches("*.").trim_matches('.').to_ascii_lowercase();
    !entry.is_empty() && (host == entry || host.ends_with(&format!(".{}", entry)))
}
