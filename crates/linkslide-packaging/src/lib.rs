pub mod archive;
pub mod error;
pub mod html;

use std::path::PathBuf;

use async_trait::async_trait;
use linkslide_core::layout::{OutputLayout, HTML_FILE, ZIP_FILE};
use linkslide_core::{PackageLocations, SessionId, SlideRecord};
use tracing::info;

pub use error::PackagingError;

/// Files written for a packaged session and where they are served.
#[derive(Clone, Debug)]
pub struct PackagedPresentation {
    pub html_path: PathBuf,
    pub zip_path: PathBuf,
    pub locations: PackageLocations,
}

/// Turns an ordered slide list into a viewable, downloadable presentation.
#[async_trait]
pub trait Packager: Send + Sync {
    async fn package(
        &self,
        session_id: &SessionId,
        slides: &[SlideRecord],
    ) -> Result<PackagedPresentation, PackagingError>;
}

/// Writes `index.html` and `presentation.zip` into the session directory.
#[derive(Clone, Debug)]
pub struct FsPackager {
    layout: OutputLayout,
}

impl FsPackager {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    fn package_blocking(
        layout: &OutputLayout,
        session_id: &SessionId,
        slides: &[SlideRecord],
    ) -> Result<PackagedPresentation, PackagingError> {
        if slides.is_empty() {
            return Err(PackagingError::EmptyPresentation);
        }
        let dir = layout.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;

        let html_path = dir.join(HTML_FILE);
        std::fs::write(&html_path, html::render(slides))?;

        let zip_path = dir.join(ZIP_FILE);
        let entries = archive::write_zip(&zip_path, &dir, slides)?;

        info!(
            session_id = %session_id,
            slides = slides.len(),
            archive_entries = entries,
            "presentation packaged"
        );

        Ok(PackagedPresentation {
            html_path,
            zip_path,
            locations: PackageLocations {
                html_url: layout.public_url(session_id, HTML_FILE),
                zip_url: layout.public_url(session_id, ZIP_FILE),
            },
        })
    }
}

#[async_trait]
impl Packager for FsPackager {
    async fn package(
        &self,
        session_id: &SessionId,
        slides: &[SlideRecord],
    ) -> Result<PackagedPresentation, PackagingError> {
        let layout = self.layout.clone();
        let session_id = session_id.clone();
        let slides = slides.to_vec();
        tokio::task::spawn_blocking(move || Self::package_blocking(&layout, &session_id, &slides))
            .await
            .map_err(|e| PackagingError::Task(e.to_string()))?
    }
}
