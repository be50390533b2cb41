//! Logical → physical schema resolution.
//! Query text is written against the logical `gold` schema; each deployment binds it to
//! whichever physical schema its DuckDB file actually has populated.

mod logical;
mod resolver;

pub use logical::LogicalQuery;
pub use resolver::{BindingSource, SchemaBinding, SchemaResolver};

/// Schema name used in query source text.
pub const LOGICAL_SCHEMA: &str = "gold";
/// Physical name used by production snapshots (tables copied into the default schema).
pub const ALTERNATE_SCHEMA: &str = "main";
/// Every schema name the store may use for the dbt gold layer.
pub const CANDIDATE_SCHEMAS: [&str; 3] = ["gold", "main", "prod"];

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
