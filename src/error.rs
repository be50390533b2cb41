//! Error model.
//! `StoreError` is the tagged result at the store boundary; the executor matches on it
//! to decide whether a schema fallback is worth trying. `AppError` is what frontends
//! (HTTP, tooling) see, with a status mapping.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced table/schema is not in the catalog. Message is the store's, verbatim.
    #[error("{0}")]
    RelationNotFound(String),
    /// The backing database could not be acquired. `diagnostics` is for logs, not users.
    #[error("data unavailable: {reason}")]
    DataUnavailable { reason: String, diagnostics: String },
    /// Anything else the store rejected (bad SQL, type mismatch, ...). Never retried.
    #[error("{0}")]
    Query(String),
    /// Reserved: binding rules always terminate today.
    #[error("schema resolution ambiguous: {0}")]
    SchemaResolutionAmbiguous(String),
}

impl StoreError {
    pub fn unavailable<R: Into<String>, D: Into<String>>(reason: R, diagnostics: D) -> Self {
        StoreError::DataUnavailable { reason: reason.into(), diagnostics: diagnostics.into() }
    }

    pub fn is_relation_not_found(&self) -> bool { matches!(self, StoreError::RelationNotFound(_)) }

    /// Classify a raw store message. Catalog misses are the only recoverable class.
    pub fn from_store_message(msg: String) -> Self {
        if is_catalog_miss(&msg) { StoreError::RelationNotFound(msg) } else { StoreError::Query(msg) }
    }
}

// Only missing relations and schemas; missing functions, types and the like are authoring errors.
const RELATION_OBJECTS: [&str; 3] = ["table with name", "view with name", "schema with name"];

fn is_catalog_miss(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("catalog error")
        && (lower.contains("does not exist") || lower.contains("not found"))
        && RELATION_OBJECTS.iter().any(|o| lower.contains(o))
}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self { StoreError::from_store_message(err.to_string()) }
}

impl From<polars::prelude::PolarsError> for StoreError {
    fn from(err: polars::prelude::PolarsError) -> Self { StoreError::Query(format!("result shaping failed: {}", err)) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Exec { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Exec { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Exec { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn exec<S: Into<String>>(code: S, msg: S) -> Self { AppError::Exec { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Exec { .. } => 422,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RelationNotFound(msg) => AppError::NotFound { code: "relation_not_found".into(), message: msg },
            // diagnostics stay in the logs; callers only get the reason
            StoreError::DataUnavailable { reason, diagnostics } => {
                tracing::error!(target: "icfes::store", "data unavailable: {} ({})", reason, diagnostics);
                AppError::Unavailable { code: "data_unavailable".into(), message: reason }
            }
            StoreError::Query(msg) => AppError::Exec { code: "query_error".into(), message: msg },
            StoreError::SchemaResolutionAmbiguous(msg) => AppError::Internal { code: "schema_ambiguous".into(), message: msg },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: format!("{:#}", err) }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
