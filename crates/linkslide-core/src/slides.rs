use serde::{Deserialize, Serialize};

/// Prefix carried by the image reference of a slide whose generation failed.
pub const FAILURE_PREFIX: &str = "Error:";

/// One generated slide as recorded in the session's slide store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Caller-assigned page number (1-based, not necessarily contiguous).
    pub page: u32,
    /// Public locator of the slide image, or a failure string.
    pub image_path: String,
    /// Narration for the slide.
    pub script: String,
}

impl SlideRecord {
    pub fn new(page: u32, image_path: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            page,
            image_path: image_path.into(),
            script: script.into(),
        }
    }

    /// Whether the image reference is a failure string rather than an image.
    pub fn is_failed(&self) -> bool {
        self.image_path.starts_with(FAILURE_PREFIX)
    }
}

/// Public locations of a packaged presentation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLocations {
    pub html_url: String,
    pub zip_url: String,
}
