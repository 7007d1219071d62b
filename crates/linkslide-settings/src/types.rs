//! Settings types. Every section falls back to its compiled default for
//! missing keys, so a partial file is always valid.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSlideSettings {
    pub server: ServerSettings,
    pub output: OutputSettings,
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub image_standard: ImageSettings,
    pub image_pro: ImageSettings,
    pub job: JobSettings,
    pub styles: Vec<StylePreset>,
}

impl Default for LinkSlideSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            output: OutputSettings::default(),
            llm: LlmSettings::default(),
            search: SearchSettings::default(),
            image_standard: ImageSettings::default(),
            image_pro: ImageSettings::pro(),
            job: JobSettings::default(),
            styles: vec![StylePreset::default()],
        }
    }
}

/// HTTP bind settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5809,
        }
    }
}

/// Where session artifacts are written and the URL prefix they are served under.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub root_dir: String,
    pub public_prefix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root_dir: "static/output".to_string(),
            public_prefix: "/static/output".to_string(),
        }
    }
}

/// OpenAI-compatible chat completion endpoint driving the agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model_id: String,
    /// Upper bound on model turns per run.
    pub max_turns: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model_id: "gpt-4o".to_string(),
            max_turns: 40,
        }
    }
}

/// Optional web search endpoint exposed to the agent as the `search` tool.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl SearchSettings {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// One image-generation backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub base_url: String,
    pub api_key: String,
    pub model_id: String,
    /// `WIDTHxHEIGHT` requested from the backend.
    pub size: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.modelscope.cn/".to_string(),
            api_key: String::new(),
            model_id: "Tongyi-MAI/Z-Image-Turbo".to_string(),
            size: "1600x900".to_string(),
        }
    }
}

impl ImageSettings {
    pub fn pro() -> Self {
        Self {
            base_url: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
            api_key: String::new(),
            model_id: "doubao-seedream-4-0-250828".to_string(),
            size: "2560x1440".to_string(),
        }
    }
}

/// Retry and polling policy for image jobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub max_attempts: u32,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub submit_timeout_secs: u64,
    pub poll_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            poll_interval_secs: 2,
            max_polls: 45,
            submit_timeout_secs: 30,
            poll_timeout_secs: 10,
            fetch_timeout_secs: 30,
            cooldown_secs: 3,
        }
    }
}

/// A named style directive offered to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePreset {
    pub name: String,
    #[serde(default)]
    pub prompt: String,
}

impl Default for StylePreset {
    fn default() -> Self {
        Self {
            name: "Default style".to_string(),
            prompt: String::new(),
        }
    }
}
