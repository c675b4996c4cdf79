mod models;
mod schema;

pub use models::{CategoryCount, Note, TagCount};
pub use schema::Database;
