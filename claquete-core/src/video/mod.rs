mod error;
mod models;
mod store;

pub use error::{StoreError, StoreResult};
pub use models::{CategoryAssociation, NewVideoJob, ProcessingStatus, VideoJob};
pub use store::{SqliteVideoStore, SqliteVideoStoreBuilder, VideoFilter};
