use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Which image backend a session generates with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    #[default]
    Standard,
    Pro,
}

impl QualityMode {
    pub fn from_flag(use_pro: bool) -> Self {
        if use_pro {
            Self::Pro
        } else {
            Self::Standard
        }
    }

    pub fn is_pro(self) -> bool {
        self == Self::Pro
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "standard mode",
            Self::Pro => "pro mode, high quality",
        }
    }
}

/// One isolated end-to-end generation request.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub mode: QualityMode,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(mode: QualityMode) -> Self {
        Self {
            id: SessionId::new(),
            mode,
            created_at: Utc::now(),
        }
    }
}

/// Per-request generation options.
#[derive(Clone, Debug, Default)]
pub struct GenerationOptions {
    pub mode: QualityMode,
    pub style_prompt: Option<String>,
    pub color_hint: Option<String>,
}

/// Compose the agent prompt: the topic, then the style directive and the
/// color directive on their own lines when present.
pub fn compose_prompt(topic: &str, options: &GenerationOptions) -> String {
    let mut prompt = topic.trim().to_string();
    if let Some(style) = non_blank(options.style_prompt.as_deref()) {
        prompt.push('\n');
        prompt.push_str(style);
    }
    if let Some(color) = non_blank(options.color_hint.as_deref()) {
        prompt.push_str(&format!("\nUse {color} as the primary color."));
    }
    prompt
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
