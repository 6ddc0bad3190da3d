pub mod builder;
pub mod coordinator;
pub mod error;
pub mod orchestrator;

pub use coordinator::{ActionResponse, IndexingCoordinator};
pub use error::IndexingError;
pub use orchestrator::SiteIndexer;
