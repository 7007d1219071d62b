use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use linkslide_core::layout::{OutputLayout, META_FILE};
use linkslide_core::{SessionId, SlideRecord};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Per-session slide metadata persisted as a JSON array in
/// `<output_root>/<session>/slides_meta.json`.
///
/// Each session's file is written only by that session's agent task, so the
/// read-modify-write in [`SlideStore::append`] is not guarded by a lock.
#[derive(Clone, Debug)]
pub struct SlideStore {
    layout: OutputLayout,
}

impl SlideStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn meta_path(&self, session_id: &SessionId) -> PathBuf {
        self.layout.session_dir(session_id).join(META_FILE)
    }

    /// Append one record, rewriting the file atomically.
    ///
    /// Missing, empty or unparseable content counts as "no records yet".
    pub fn append(&self, session_id: &SessionId, record: SlideRecord) -> Result<(), StoreError> {
        let dir = self.layout.session_dir(session_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(META_FILE);

        let mut records = match load_records(&path) {
            Ok(records) => records.unwrap_or_default(),
            Err(StoreError::Corrupt(reason)) => {
                warn!(session_id = %session_id, %reason, "discarding corrupt slide metadata");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        debug!(session_id = %session_id, page = record.page, existing = records.len(), "appending slide");
        records.push(record);

        let body = serde_json::to_string_pretty(&records)?;
        let tmp = dir.join(format!("{META_FILE}.tmp"));
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// All records sorted by page ascending; duplicates keep insertion order.
    pub fn read_all(&self, session_id: &SessionId) -> Result<Vec<SlideRecord>, StoreError> {
        let mut records = load_records(&self.meta_path(session_id))?.unwrap_or_default();
        if records.is_empty() {
            return Err(StoreError::NoSlides);
        }
        records.sort_by_key(|r| r.page);
        Ok(records)
    }
}

/// `Ok(None)` when the file does not exist or is blank.
fn load_records(path: &Path) -> Result<Option<Vec<SlideRecord>>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SlideStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SlideStore::new(OutputLayout::new(dir.path(), "/static/output"));
        (dir, store)
    }

    fn record(page: u32, script: &str) -> SlideRecord {
        SlideRecord::new(page, format!("/static/output/s/slide_{page}.jpg"), script)
    }

    #[test]
    fn read_back_is_sorted_by_page() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        store.append(&sid, record(3, "c")).unwrap();
        store.append(&sid, record(1, "a")).unwrap();
        store.append(&sid, record(2, "b")).unwrap();

        let pages: Vec<u32> = store.read_all(&sid).unwrap().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_pages_keep_insertion_order() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        store.append(&sid, record(2, "first")).unwrap();
        store.append(&sid, record(1, "intro")).unwrap();
        store.append(&sid, record(2, "second")).unwrap();

        let scripts: Vec<String> = store
            .read_all(&sid)
            .unwrap()
            .into_iter()
            .map(|r| r.script)
            .collect();
        assert_eq!(scripts, vec!["intro", "first", "second"]);
    }

    #[test]
    fn append_creates_session_directory() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        assert!(!store.layout().session_dir(&sid).exists());
        store.append(&sid, record(1, "a")).unwrap();
        assert!(store.meta_path(&sid).exists());
    }

    #[test]
    fn append_over_corrupt_file_starts_fresh() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        fs::create_dir_all(store.layout().session_dir(&sid)).unwrap();
        fs::write(store.meta_path(&sid), "{not json").unwrap();

        store.append(&sid, record(4, "d")).unwrap();
        let records = store.read_all(&sid).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].page, 4);
    }

    #[test]
    fn append_over_empty_file() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        fs::create_dir_all(store.layout().session_dir(&sid)).unwrap();
        fs::write(store.meta_path(&sid), "").unwrap();

        store.append(&sid, record(1, "a")).unwrap();
        assert_eq!(store.read_all(&sid).unwrap().len(), 1);
    }

    #[test]
    fn read_missing_is_no_slides() {
        let (_dir, store) = store();
        let err = store.read_all(&SessionId::new()).unwrap_err();
        assert!(matches!(err, StoreError::NoSlides));
        assert_eq!(err.to_string(), "no slides generated");
    }

    #[test]
    fn read_empty_list_is_no_slides() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        fs::create_dir_all(store.layout().session_dir(&sid)).unwrap();
        fs::write(store.meta_path(&sid), "[]").unwrap();
        assert!(matches!(store.read_all(&sid), Err(StoreError::NoSlides)));
    }

    #[test]
    fn read_corrupt_is_error() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        fs::create_dir_all(store.layout().session_dir(&sid)).unwrap();
        fs::write(store.meta_path(&sid), "[{\"page\": \"one\"}]").unwrap();
        assert!(matches!(store.read_all(&sid), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn file_is_pretty_json_with_unicode_preserved() {
        let (_dir, store) = store();
        let sid = SessionId::new();
        store.append(&sid, record(1, "季度回顾")).unwrap();

        let raw = fs::read_to_string(store.meta_path(&sid)).unwrap();
        assert!(raw.contains("季度回顾"));
        assert!(raw.contains("\n  {"));
        assert!(!store.layout().session_dir(&sid).join("slides_meta.json.tmp").exists());
    }

    #[test]
    fn sessions_are_isolated() {
        let (_dir, store) = store();
        let a = SessionId::new();
        let b = SessionId::new();
        store.append(&a, record(1, "a")).unwrap();
        assert!(matches!(store.read_all(&b), Err(StoreError::NoSlides)));
    }
}
