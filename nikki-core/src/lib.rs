pub mod auth;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod enrichment;
pub mod error;
pub mod media;
pub mod models;
pub mod protocol;
pub mod store;

pub use auth::AuthGate;
pub use config::NikkiConfig;
pub use coordinator::{Committed, ReadModifyWrite};
pub use document::DocumentAdapter;
pub use enrichment::{create_annotator, Annotator, DisabledAnnotator, GeminiAnnotator};
pub use error::DiaryError;
pub use models::{CheckIn, DiaryDocument, DiaryEntry};
pub use store::{DocumentStore, StoreError, VersionToken};
