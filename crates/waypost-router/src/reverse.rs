//! Reverse routing: building paths and URLs from a route and parameters.
//!
//! [`build_uri`] walks the route's segment tree. Literals are copied, each
//! parameter takes its supplied value or else its default, and optional groups
//! are built speculatively and dropped whole if any parameter inside them
//! cannot be resolved. Only a parameter outside every optional group is
//! required.
//!
//! A value resolves only if it is non-empty and satisfies the parameter's
//! constraint, so a built path always matches the route again and yields the
//! same values.
//!
//! ```
//! use waypost_router::pattern::{Params, Route};
//! use waypost_router::reverse::build_uri;
//!
//! let route = Route::compile("(<controller>(/<action>(/<id>)))").unwrap();
//! let mut params = Params::new();
//! params.insert("controller".into(), "news".into());
//! params.insert("id".into(), "42".into());
//!
//! // `id` lives inside the group that also needs `action`, so it is dropped.
//! assert_eq!(build_uri(&route, &params).unwrap(), "news");
//! ```

use waypost_core::{WaypostError, WaypostResult};

use crate::pattern::{Params, Route, Segment};

/// Scheme and host for absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub protocol: String,
    pub host: String,
}

impl Origin {
    /// Creates an origin from a protocol (e.g. `https`) and a host.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
        }
    }
}

/// Builds the path for `route` from `params`.
///
/// Static routes return their pattern unchanged and ignore `params`. Keys not
/// declared by the pattern are ignored. The result has no leading `/`.
///
/// # Errors
///
/// Returns [`WaypostError::MissingRequiredParameter`] naming the first
/// mandatory parameter that has neither a supplied value nor a default, or
/// whose value is empty or violates its constraint.
pub fn build_uri(route: &Route, params: &Params) -> WaypostResult<String> {
    if route.is_static() {
        return Ok(route.pattern().to_string());
    }

    let mut uri = String::new();
    build_segments(route.segments(), route, params, &mut uri).map_err(|parameter| {
        WaypostError::MissingRequiredParameter {
            pattern: route.pattern().to_string(),
            parameter: parameter.to_string(),
        }
    })?;
    Ok(uri)
}

/// Appends `segments` to `out`. On failure returns the first unresolvable
/// parameter name; `out` may then hold a partial result the caller discards.
fn build_segments<'a>(
    segments: &'a [Segment],
    route: &Route,
    params: &Params,
    out: &mut String,
) -> Result<(), &'a str> {
    for segment in segments {
        match segment {
            Segment::Literal { text } => out.push_str(text),
            Segment::Parameter { name, .. } => {
                let value = params
                    .get(name)
                    .or_else(|| route.defaults().get(name))
                    .filter(|value| route.accepts(name, value))
                    .ok_or(name.as_str())?;
                out.push_str(value);
            }
            Segment::Optional { children } => {
                let mut group = String::new();
                if build_segments(children, route, params, &mut group).is_ok() {
                    out.push_str(&group);
                }
            }
        }
    }
    Ok(())
}

/// Joins a base path and a route URI: `("/app/", "news")` gives `/app/news`.
pub fn join_base(base_url: &str, uri: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let uri = uri.trim_start_matches('/');
    if uri.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{uri}")
    }
}

/// Builds the URL for `route`: the URI prefixed with `base_url`, and with
/// `protocol://host` in front when an origin is given.
///
/// # Examples
///
/// ```
/// use waypost_router::pattern::{Params, Route, RouteOptions};
/// use waypost_router::reverse::{url_for, Origin};
///
/// let options = RouteOptions::new().default_value("controller", "welcome");
/// let route = Route::compile_with("(<controller>(/<action>(/<id>)))", &options).unwrap();
///
/// assert_eq!(url_for(&route, &Params::new(), "/", None).unwrap(), "/welcome");
///
/// let origin = Origin::new("https", "example.com");
/// assert_eq!(
///     url_for(&route, &Params::new(), "/", Some(&origin)).unwrap(),
///     "https://example.com/welcome"
/// );
/// ```
///
/// # Errors
///
/// Propagates [`build_uri`] errors.
pub fn url_for(
    route: &Route,
    params: &Params,
    base_url: &str,
    origin: Option<&Origin>,
) -> WaypostResult<String> {
    let path = join_base(base_url, &build_uri(route, params)?);
    Ok(match origin {
        Some(origin) => format!("{}://{}{path}", origin.protocol, origin.host),
        None => path,
    })
}

impl Route {
    /// Builds the path for this route. See [`build_uri`].
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::MissingRequiredParameter`] if a mandatory
    /// parameter cannot be resolved.
    pub fn uri(&self, params: &Params) -> WaypostResult<String> {
        build_uri(self, params)
    }
}
