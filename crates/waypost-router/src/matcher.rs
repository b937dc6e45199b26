//! Matching request paths against compiled routes.
//!
//! Matching is a pure function of an immutable [`Route`]; it takes no locks and
//! may run concurrently from any number of threads.

use crate::pattern::{Params, Route};

/// Strips leading and trailing `/` from a request path.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Matches `path` against `route`.
///
/// Returns `None` when the route does not match. On success the result holds
/// every route default overlaid with each parameter captured from the path.
/// Parameters whose optional group was not taken are left out (or keep their
/// default); they never appear as empty strings.
///
/// When two optional groups could both explain the same text, the regex
/// engine's leftmost-first preference decides.
///
/// # Examples
///
/// ```
/// use waypost_router::matcher::match_path;
/// use waypost_router::pattern::Route;
///
/// let route = Route::compile("admin(/<controller>(/<action>(/<id>)))").unwrap();
/// assert!(match_path(&route, "").is_none());
/// assert!(match_path(&route, "admin").unwrap().is_empty());
///
/// let params = match_path(&route, "admin/users/add").unwrap();
/// assert_eq!(params["controller"], "users");
/// assert_eq!(params["action"], "add");
/// ```
pub fn match_path(route: &Route, path: &str) -> Option<Params> {
    let captures = route.regex().captures(normalize_path(path))?;

    let mut params = route.defaults().clone();
    for (name, slot) in route.captures() {
        if let Some(m) = captures.get(slot) {
            if !m.as_str().is_empty() {
                params.insert(name.to_string(), m.as_str().to_string());
            }
        }
    }

    Some(params)
}

impl Route {
    /// Matches `path` against this route. See [`match_path`].
    pub fn matches(&self, path: &str) -> Option<Params> {
        match_path(self, path)
    }
}
