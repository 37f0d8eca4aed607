//! Host route sources.
//!
//! A route source fills a `host_route` table mapping host patterns to
//! document roots. Two formats are accepted:
//!
//! ```text
//! routes.rhai:   host_route["*.example.com"] = "/srv/example";
//!                host_route["www.example.com"] = "/srv/www";
//!
//! routes.toml:   [host_route]
//!                "*.example.com" = "/srv/example"
//! ```
//!
//! Scripts run in a fresh rhai engine with `host_route` pre-declared as an
//! empty map and a bounded operation budget. Entries whose root is not a
//! string are skipped. TOML tables keep file order; rhai maps iterate in key
//! order.

use std::path::{Path, PathBuf};

use rhai::{Engine, Map, Scope};

/// Ordered host pattern → document root pairs.
pub type RouteTable = Vec<(String, String)>;

/// Name of the table a route source fills.
pub const ROUTE_TABLE: &str = "host_route";

const ROUTE_SCRIPT_MAX_OPERATIONS: u64 = 100_000;

/// Failure to turn a route source into a route table.
#[derive(Debug, thiserror::Error)]
pub enum RouteSourceError {
    #[error("cannot read route source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid route table: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("route script failed: {0}")]
    Script(String),

    #[error("route source does not define a `{name}` table", name = ROUTE_TABLE)]
    MissingTable,
}

/// Read and evaluate a route source, picking the format by extension.
pub fn load_routes(path: &Path) -> Result<RouteTable, RouteSourceError> {
    let source = std::fs::read_to_string(path).map_err(|source| RouteSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        parse_toml_routes(&source)
    } else {
        eval_route_script(&source)
    }
}

/// Parse a TOML document with a `[host_route]` table.
pub fn parse_toml_routes(source: &str) -> Result<RouteTable, RouteSourceError> {
    let document: toml::Table = toml::from_str(source)?;
    let table = document
        .get(ROUTE_TABLE)
        .and_then(toml::Value::as_table)
        .ok_or(RouteSourceError::MissingTable)?;

    let mut routes = RouteTable::with_capacity(table.len());
    for (host, root) in table {
        match root.as_str() {
            Some(root) => routes.push((host.clone(), root.to_string())),
            None => tracing::warn!(host = %host, "Route root is not a string, skipping"),
        }
    }
    Ok(routes)
}

/// Run a route script and collect the `host_route` map it leaves behind.
pub fn eval_route_script(source: &str) -> Result<RouteTable, RouteSourceError> {
    let mut engine = Engine::new();
    engine.set_max_operations(ROUTE_SCRIPT_MAX_OPERATIONS);

    let mut scope = Scope::new();
    scope.push(ROUTE_TABLE, Map::new());

    engine
        .run_with_scope(&mut scope, source)
        .map_err(|e| RouteSourceError::Script(e.to_string()))?;

    let table = scope
        .get_value::<Map>(ROUTE_TABLE)
        .ok_or(RouteSourceError::MissingTable)?;

    let mut routes = RouteTable::with_capacity(table.len());
    for (host, root) in table {
        match root.into_string() {
            Ok(root) => routes.push((host.to_string(), root)),
            Err(kind) => tracing::warn!(host = %host, kind = kind, "Route root is not a string, skipping"),
        }
    }
    Ok(routes)
}
