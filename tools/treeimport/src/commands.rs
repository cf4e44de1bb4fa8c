pub mod import;
pub mod schema;
