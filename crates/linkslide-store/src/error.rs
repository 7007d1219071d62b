#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slide metadata is corrupt: {0}")]
    Corrupt(String),

    #[error("no slides generated")]
    NoSlides,

    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
