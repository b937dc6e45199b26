//! Route registry.
//!
//! [`RouteTable`] is an ordered, named collection of compiled routes. Paths are
//! matched against it in registration order and the first match wins, so more
//! specific routes must be registered before more general ones.
//!
//! [`RouteRegistry`] holds the process-wide table. It is filled once at
//! bootstrap and read through immutable [`Arc`] snapshots afterwards; a rebuild
//! swaps in a complete new table so readers never see a partially populated one.
//!
//! ```
//! use waypost_router::pattern::RouteOptions;
//! use waypost_router::registry::RouteTable;
//!
//! let mut table = RouteTable::new();
//! table.register(Some("admin"), "admin(/<controller>(/<action>))", &RouteOptions::new()).unwrap();
//! table.register(Some("default"), "(<controller>(/<action>))", &RouteOptions::new()).unwrap();
//!
//! let m = table.first_match("admin/users").unwrap();
//! assert_eq!(m.name, "admin");
//! assert_eq!(m.params["controller"], "users");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use waypost_core::{Settings, WaypostError, WaypostResult};

use crate::cache::{cache_key_for, RouteCache};
use crate::config::{build_table, RouteDefinition};
use crate::matcher::match_path;
use crate::pattern::{Params, Route, RouteOptions};
use crate::reverse::{build_uri, url_for, Origin};

/// A successful [`RouteTable::first_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// The name the matching route is registered under.
    pub name: &'a str,
    /// The matching route.
    pub route: &'a Arc<Route>,
    /// Parameters extracted from the path, with defaults applied.
    pub params: Params,
}

/// An ordered, named collection of compiled routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr", into = "TableRepr")]
pub struct RouteTable {
    routes: Vec<(String, Arc<Route>)>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and registers it.
    ///
    /// Without a name, an ordinal name (`#0`, `#1`, ...) is synthesized.
    /// Registering an existing name replaces that route in place, keeping its
    /// position in the match order. On failure the table is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::RouteRegistration`] wrapping the compile error.
    pub fn register(
        &mut self,
        name: Option<&str>,
        pattern: &str,
        options: &RouteOptions,
    ) -> WaypostResult<Arc<Route>> {
        let name = name.map_or_else(|| self.synthesize_name(), String::from);

        let route = Route::compile_with(pattern, options).map_err(|e| {
            tracing::error!(route = %name, pattern, "Route failed to compile: {e}");
            WaypostError::RouteRegistration {
                name: name.clone(),
                source: Box::new(e),
            }
        })?;

        tracing::debug!(route = %name, pattern, "Registered route");
        Ok(self.insert(name, route))
    }

    /// Stores an already compiled route under `name`.
    pub fn insert(&mut self, name: impl Into<String>, route: Route) -> Arc<Route> {
        let name = name.into();
        let route = Arc::new(route);
        if let Some(&position) = self.index.get(&name) {
            self.routes[position].1 = Arc::clone(&route);
        } else {
            self.index.insert(name.clone(), self.routes.len());
            self.routes.push((name, Arc::clone(&route)));
        }
        route
    }

    fn synthesize_name(&self) -> String {
        let mut ordinal = self.routes.len();
        loop {
            let candidate = format!("#{ordinal}");
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            ordinal += 1;
        }
    }

    /// Returns the first route, in registration order, that matches `path`.
    pub fn first_match(&self, path: &str) -> Option<RouteMatch<'_>> {
        let found = self.routes.iter().find_map(|(name, route)| {
            match_path(route, path).map(|params| RouteMatch {
                name,
                route,
                params,
            })
        });
        if found.is_none() {
            tracing::debug!(path, routes = self.routes.len(), "No route matches path");
        }
        found
    }

    /// Looks up a route by name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<Route>> {
        self.index.get(name).map(|&i| &self.routes[i].1)
    }

    /// Returns the name `route` is registered under.
    pub fn name_of(&self, route: &Route) -> Option<&str> {
        self.routes
            .iter()
            .find(|(_, candidate)| std::ptr::eq(candidate.as_ref(), route))
            .map(|(name, _)| name.as_str())
    }

    /// Builds the path for the named route.
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::RouteNotFound`] for an unknown name, or the
    /// reverse-build error.
    pub fn uri(&self, name: &str, params: &Params) -> WaypostResult<String> {
        build_uri(self.require(name)?, params)
    }

    /// Builds the URL for the named route. See [`url_for`].
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::RouteNotFound`] for an unknown name, or the
    /// reverse-build error.
    pub fn url(
        &self,
        name: &str,
        params: &Params,
        base_url: &str,
        origin: Option<&Origin>,
    ) -> WaypostResult<String> {
        url_for(self.require(name)?, params, base_url, origin)
    }

    fn require(&self, name: &str) -> WaypostResult<&Arc<Route>> {
        self.lookup(name)
            .ok_or_else(|| WaypostError::RouteNotFound(name.to_string()))
    }

    /// Iterates over `(name, route)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Route>)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), route))
    }

    /// Returns the route names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.routes.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Serialized form of a [`RouteTable`]: routes in match order.
#[derive(Serialize, Deserialize)]
struct TableRepr {
    routes: Vec<NamedRoute>,
}

#[derive(Serialize, Deserialize)]
struct NamedRoute {
    name: String,
    route: Route,
}

impl From<RouteTable> for TableRepr {
    fn from(table: RouteTable) -> Self {
        Self {
            routes: table
                .routes
                .into_iter()
                .map(|(name, route)| NamedRoute {
                    name,
                    route: Arc::unwrap_or_clone(route),
                })
                .collect(),
        }
    }
}

impl TryFrom<TableRepr> for RouteTable {
    type Error = WaypostError;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for NamedRoute { name, route } in repr.routes {
            if table.index.contains_key(&name) {
                return Err(WaypostError::SerializationError(format!(
                    "route '{name}' appears twice"
                )));
            }
            table.insert(name, route);
        }
        Ok(table)
    }
}

// ── Process-wide registry ───────────────────────────────────────────────

/// Holds the current route table and swaps it atomically on rebuild.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    current: RwLock<Arc<RouteTable>>,
}

impl RouteRegistry {
    /// Creates a registry holding an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current table. The snapshot stays valid and unchanged even
    /// if a new table is installed afterwards.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the current table and returns the newly installed snapshot.
    pub fn install(&self, table: RouteTable) -> Arc<RouteTable> {
        let table = Arc::new(table);
        let routes = table.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&table);
        tracing::info!(routes, "Installed route table");
        table
    }
}

/// Returns the global route registry singleton.
pub fn global_registry() -> &'static RouteRegistry {
    static REGISTRY: OnceLock<RouteRegistry> = OnceLock::new();
    REGISTRY.get_or_init(RouteRegistry::new)
}

// ── Bootstrap ────────────────────────────────────────────────────────────

/// Outcome of [`bootstrap`].
#[derive(Debug)]
pub struct Bootstrap {
    /// The installed table.
    pub table: Arc<RouteTable>,
    /// Whether the table was loaded from the route cache.
    pub from_cache: bool,
    /// Registration failures. The failing routes are absent from the table.
    pub errors: Vec<WaypostError>,
}

/// Builds the route table for `definitions` and installs it into `registry`.
///
/// When route caching is enabled in `settings`, a cached table for the same
/// definitions is used if present; otherwise the compiled table is saved
/// for the next start. Tables with registration failures are not cached.
pub fn bootstrap(
    registry: &RouteRegistry,
    settings: &Settings,
    definitions: &[RouteDefinition],
) -> Bootstrap {
    let cache = settings.route_cache_dir().map(RouteCache::new);
    let key = cache_key_for(definitions);

    if let Some(table) = cache.as_ref().and_then(|cache| cache.load(&key)) {
        return Bootstrap {
            table: registry.install(table),
            from_cache: true,
            errors: Vec::new(),
        };
    }

    let (table, errors) = build_table(definitions);

    if let Some(cache) = &cache {
        if errors.is_empty() {
            if let Err(e) = cache.save(&key, &table) {
                tracing::warn!("Failed to cache route table: {e}");
            }
        }
    }

    Bootstrap {
        table: registry.install(table),
        from_cache: false,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> RouteOptions {
        RouteOptions::new()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = RouteTable::new();
        let route = table.register(Some("foobar"), "(<controller>)", &opts()).unwrap();
        assert_eq!(table.lookup("foobar").unwrap(), &route);
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn test_name_of() {
        let mut table = RouteTable::new();
        table.register(Some("foobar"), "(<controller>(/<action>(/<id>)))", &opts()).unwrap();
        let route = Arc::clone(table.lookup("foobar").unwrap());
        assert_eq!(table.name_of(&route), Some("foobar"));

        let stranger = Route::compile("(<controller>(/<action>(/<id>)))").unwrap();
        assert_eq!(table.name_of(&stranger), None);
    }

    #[test]
    fn test_synthesized_names() {
        let mut table = RouteTable::new();
        table.register(None, "a", &opts()).unwrap();
        table.register(Some("#1"), "b", &opts()).unwrap();
        table.register(None, "c", &opts()).unwrap();
        assert_eq!(table.names(), ["#0", "#1", "#2"]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut table = RouteTable::new();
        table.register(Some("first"), "one", &opts()).unwrap();
        table.register(Some("second"), "two", &opts()).unwrap();
        table.register(Some("first"), "uno", &opts()).unwrap();

        assert_eq!(table.names(), ["first", "second"]);
        assert_eq!(table.lookup("first").unwrap().pattern(), "uno");
        assert!(table.first_match("one").is_none());
        assert_eq!(table.first_match("uno").unwrap().name, "first");
    }

    #[test]
    fn test_first_match_respects_order() {
        let mut table = RouteTable::new();
        table.register(Some("specific"), "users/new", &opts()).unwrap();
        table.register(Some("general"), "users/<id>", &opts()).unwrap();

        assert_eq!(table.first_match("users/new").unwrap().name, "specific");
        let m = table.first_match("users/5").unwrap();
        assert_eq!(m.name, "general");
        assert_eq!(m.params["id"], "5");
        assert!(table.first_match("posts").is_none());
    }

    #[test]
    fn test_failed_registration_leaves_table_unchanged() {
        let mut table = RouteTable::new();
        table.register(Some("ok"), "ok", &opts()).unwrap();
        let err = table.register(Some("broken"), "broken(/<id>", &opts()).unwrap_err();

        assert!(err.is_pattern_error());
        assert!(err.to_string().contains("'broken'"));
        assert!(err.to_string().contains("broken(/<id>"));
        assert_eq!(table.names(), ["ok"]);
    }

    #[test]
    fn test_uri_and_url_by_name() {
        let mut table = RouteTable::new();
        table
            .register(
                Some("foobar"),
                "(<controller>(/<action>(/<id>)))",
                &RouteOptions::new().default_value("controller", "welcome"),
            )
            .unwrap();

        assert_eq!(table.uri("foobar", &Params::new()).unwrap(), "welcome");
        assert_eq!(table.url("foobar", &Params::new(), "/", None).unwrap(), "/welcome");
        assert!(matches!(
            table.uri("nope", &Params::new()),
            Err(WaypostError::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_table_serde_roundtrip() {
        let mut table = RouteTable::new();
        table.register(Some("a"), "a/<x>", &opts()).unwrap();
        table.register(None, "(<y>)", &opts()).unwrap();

        let json = serde_json::to_string(&table).unwrap();
        let back: RouteTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.names(), ["a", "#1"]);
    }

    #[test]
    fn test_registry_install_swaps_snapshot() {
        let registry = RouteRegistry::new();
        assert!(registry.snapshot().is_empty());

        let mut table = RouteTable::new();
        table.register(Some("home"), "", &opts()).unwrap();
        let before = registry.snapshot();
        registry.install(table);

        assert!(before.is_empty());
        assert_eq!(registry.snapshot().names(), ["home"]);
    }

    #[test]
    fn test_global_registry_is_singleton() {
        assert!(std::ptr::eq(global_registry(), global_registry()));
    }

    #[test]
    fn test_bootstrap_without_cache() {
        let registry = RouteRegistry::new();
        let definitions = vec![
            RouteDefinition::new("admin(/<controller>)").named("admin"),
            RouteDefinition::new("bad(").named("bad"),
            RouteDefinition::new("(<controller>)").named("default"),
        ];

        let result = bootstrap(&registry, &Settings::default(), &definitions);
        assert!(!result.from_cache);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.table.names(), ["admin", "default"]);
        assert_eq!(registry.snapshot().names(), ["admin", "default"]);
    }
}
