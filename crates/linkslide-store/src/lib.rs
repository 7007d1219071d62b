pub mod error;
pub mod slides;

pub use error::StoreError;
pub use slides::SlideStore;
