//! Bar table - database model and repository.

mod model;
mod repository;

pub use model::BarRecord;
pub use repository::SqliteBarStore;
