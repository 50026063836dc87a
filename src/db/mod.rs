mod actions;
mod flows;
mod history;
mod matches;
mod notes;
mod ordering;
mod repository;
pub mod schema;
pub mod store;

pub use actions::SavedMatch;
pub use ordering::{needs_normalization, OrderingError};
pub use repository::Repository;
pub use store::{Filter, NaturalKey, Record, SoftDelete};
