use std::fs::File;
use std::io::Write;
use std::path::Path;

use linkslide_core::layout::{file_name_of, HTML_FILE};
use linkslide_core::SlideRecord;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackagingError;

/// Write `index.html` plus every slide image present in `session_dir`.
///
/// Failed slides and images missing on disk are skipped. Returns the number
/// of entries written.
pub fn write_zip(
    zip_path: &Path,
    session_dir: &Path,
    slides: &[SlideRecord],
) -> Result<usize, PackagingError> {
    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(HTML_FILE, options)?;
    writer.write_all(&std::fs::read(session_dir.join(HTML_FILE))?)?;
    let mut entries = 1;

    let mut seen = std::collections::HashSet::new();
    for slide in slides.iter().filter(|s| !s.is_failed()) {
        let name = file_name_of(&slide.image_path);
        if !seen.insert(name) {
            continue;
        }
        let path = session_dir.join(name);
        if !path.is_file() {
            debug!(path = %path.display(), "slide image missing, leaving it out of the archive");
            continue;
        }
        writer.start_file(name, options)?;
        writer.write_all(&std::fs::read(&path)?)?;
        entries += 1;
    }

    writer.finish()?;
    Ok(entries)
}
