use std::path::{Path, PathBuf};

use crate::ids::SessionId;

/// Slide metadata file inside a session directory.
pub const META_FILE: &str = "slides_meta.json";
/// Viewer page written by packaging.
pub const HTML_FILE: &str = "index.html";
/// Archive written by packaging.
pub const ZIP_FILE: &str = "presentation.zip";

/// Where session artifacts live on disk and under which URL prefix they are served.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
    public_prefix: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        let prefix: String = public_prefix.into();
        Self {
            root: root.into(),
            public_prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }

    pub fn public_url(&self, session_id: &SessionId, file_name: &str) -> String {
        format!("{}/{}/{}", self.public_prefix, session_id, file_name)
    }

    pub fn slide_file_name(slide_index: u32) -> String {
        format!("slide_{slide_index}.jpg")
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new("static/output", "/static/output")
    }
}

/// Last path segment of an image reference (`/static/output/s/slide_1.jpg` → `slide_1.jpg`).
pub fn file_name_of(image_ref: &str) -> &str {
    image_ref.rsplit('/').next().unwrap_or(image_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_paths_and_urls() {
        let layout = OutputLayout::new("/data/out", "/static/output/");
        let sid = SessionId::from_raw("sess_1");
        assert_eq!(layout.session_dir(&sid), PathBuf::from("/data/out/sess_1"));
        assert_eq!(
            layout.public_url(&sid, HTML_FILE),
            "/static/output/sess_1/index.html"
        );
    }

    #[test]
    fn slide_file_names() {
        assert_eq!(OutputLayout::slide_file_name(3), "slide_3.jpg");
    }

    #[test]
    fn file_name_of_ref() {
        assert_eq!(file_name_of("/static/output/s/slide_1.jpg"), "slide_1.jpg");
        assert_eq!(file_name_of("slide_1.jpg"), "slide_1.jpg");
    }
}
