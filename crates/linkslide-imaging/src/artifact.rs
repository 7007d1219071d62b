use std::path::PathBuf;

use async_trait::async_trait;
use image::ImageFormat;
use linkslide_core::layout::OutputLayout;
use linkslide_core::SessionId;
use reqwest::Client;
use tracing::debug;

use crate::error::JobError;

/// Downloads a generated image and persists it for the session.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Returns the public reference of the stored slide image.
    async fn fetch(
        &self,
        image_url: &str,
        session_id: &SessionId,
        slide_index: u32,
    ) -> Result<String, JobError>;
}

/// Fetches over HTTP, decodes, and re-encodes as JPEG under the session directory.
pub struct HttpArtifactFetcher {
    client: Client,
    layout: OutputLayout,
}

impl HttpArtifactFetcher {
    pub fn new(client: Client, layout: OutputLayout) -> Self {
        Self { client, layout }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(
        &self,
        image_url: &str,
        session_id: &SessionId,
        slide_index: u32,
    ) -> Result<String, JobError> {
        let resp = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| JobError::ArtifactFetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::ArtifactFetch(format!(
                "download returned HTTP {}",
                status.as_u16()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| JobError::ArtifactFetch(e.to_string()))?;

        let file_name = OutputLayout::slide_file_name(slide_index);
        let dir = self.layout.session_dir(session_id);
        let path = dir.join(&file_name);
        let size = bytes.len();

        tokio::task::spawn_blocking(move || persist_jpeg(&bytes, dir, path))
            .await
            .map_err(|e| JobError::ArtifactFetch(format!("encode task failed: {e}")))??;

        debug!(session_id = %session_id, slide_index, bytes = size, "slide image stored");
        Ok(self.layout.public_url(session_id, &file_name))
    }
}

fn persist_jpeg(bytes: &[u8], dir: PathBuf, path: PathBuf) -> Result<(), JobError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| JobError::ArtifactFetch(format!("not a decodable image: {e}")))?;
    std::fs::create_dir_all(&dir).map_err(|e| JobError::ArtifactFetch(e.to_string()))?;
    decoded
        .to_rgb8()
        .save_with_format(&path, ImageFormat::Jpeg)
        .map_err(|e| JobError::ArtifactFetch(format!("failed to write {}: {e}", path.display())))
}
