#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("nothing to package")]
    EmptyPresentation,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("packaging task failed: {0}")]
    Task(String),
}
