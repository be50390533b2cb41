use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use super::{LogicalQuery, ALTERNATE_SCHEMA, LOGICAL_SCHEMA};
use crate::config::{Settings, StoreLocation};

/// Why a binding was chosen; surfaced in startup logs and the store_check tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    Override,
    RemoteLocation,
    ProductionMarker,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBinding {
    pub logical: String,
    pub physical: String,
    pub source: BindingSource,
}

impl SchemaBinding {
    /// Explicit override > remote location or production marker > logical name.
    pub fn compute(location: &StoreLocation, schema_override: Option<&str>) -> Self {
        let bind = |physical: &str, source| SchemaBinding {
            logical: LOGICAL_SCHEMA.to_string(),
            physical: physical.to_string(),
            source,
        };
        if let Some(o) = schema_override.map(str::trim).filter(|o| !o.is_empty()) {
            return bind(&o.to_ascii_lowercase(), BindingSource::Override);
        }
        if location.is_remote() {
            return bind(ALTERNATE_SCHEMA, BindingSource::RemoteLocation);
        }
        if location.as_str().to_ascii_lowercase().contains("prod") {
            return bind(ALTERNATE_SCHEMA, BindingSource::ProductionMarker);
        }
        bind(LOGICAL_SCHEMA, BindingSource::Default)
    }

    pub fn is_identity(&self) -> bool { self.physical == self.logical }

    /// Second physical candidate tried when the bound one misses a relation.
    pub fn alternate(&self) -> &'static str {
        if self.physical == LOGICAL_SCHEMA { ALTERNATE_SCHEMA } else { LOGICAL_SCHEMA }
    }
}

static GLOBAL: OnceCell<Arc<SchemaResolver>> = OnceCell::new();

/// Rewrites logical query text to the deployment's physical schema.
///
/// The binding is computed on first use and never re-evaluated; picking up a changed
/// configuration needs a restart.
pub struct SchemaResolver {
    location: StoreLocation,
    schema_override: Option<String>,
    binding: OnceCell<SchemaBinding>,
}

impl SchemaResolver {
    pub fn new(location: StoreLocation, schema_override: Option<String>) -> Self {
        Self { location, schema_override, binding: OnceCell::new() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.store_location.clone(), settings.schema_override.clone())
    }

    /// A resolver with a pre-computed binding.
    pub fn with_binding(binding: SchemaBinding) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(binding);
        Self { location: StoreLocation::Local(Default::default()), schema_override: None, binding: cell }
    }

    /// Process-wide resolver. The first caller's settings win.
    pub fn global(settings: &Settings) -> Arc<SchemaResolver> {
        GLOBAL.get_or_init(|| Arc::new(SchemaResolver::from_settings(settings))).clone()
    }

    pub fn binding(&self) -> &SchemaBinding {
        self.binding.get_or_init(|| {
            let b = SchemaBinding::compute(&self.location, self.schema_override.as_deref());
            info!(
                target: "icfes::schema",
                "schema binding: {} -> {} ({:?}, location='{}')",
                b.logical, b.physical, b.source, self.location.as_str()
            );
            b
        })
    }

    /// Text form of `resolve_query`.
    pub fn resolve(&self, sql: &str) -> String {
        if self.binding().is_identity() {
            return sql.to_string();
        }
        self.resolve_query(&LogicalQuery::parse(sql)).to_sql()
    }

    pub fn resolve_query(&self, q: &LogicalQuery) -> LogicalQuery {
        let b = self.binding();
        if b.is_identity() { q.clone() } else { q.rebind(&b.logical, &b.physical) }
    }

    /// The one fallback rewrite for an already resolved query: bound → alternate when the
    /// query uses the bound schema, else alternate → bound. `None` when it uses neither.
    pub fn fallback_for(&self, resolved: &LogicalQuery) -> Option<LogicalQuery> {
        let b = self.binding();
        let alt = b.alternate();
        let out = if resolved.references(&b.physical) {
            Some(resolved.rebind(&b.physical, alt))
        } else if resolved.references(alt) {
            Some(resolved.rebind(alt, &b.physical))
        } else {
            None
        };
        debug!(target: "icfes::schema", "fallback for bound='{}' alt='{}': {}", b.physical, alt, out.is_some());
        out
    }
}
