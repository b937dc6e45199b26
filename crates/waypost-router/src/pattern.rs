//! Route patterns and their compiled form.
//!
//! A pattern is literal text with two kinds of markup:
//!
//! - `<name>` / `<name:regex>` declares a named parameter, optionally with an
//!   inline constraint.
//! - `( ... )` wraps an optional group, which may nest. A group is matched and
//!   reverse-built as a unit: either all of it is present or none of it is.
//!
//! [`Route::compile`] parses the pattern into a tree of [`Segment`]s and derives
//! an anchored regular expression from that tree. The tree is the source of
//! truth; the expression is never edited independently.
//!
//! ```
//! use waypost_router::pattern::Route;
//!
//! let route = Route::compile("(<controller>(/<action>(/<id>)))").unwrap();
//! assert_eq!(route.parameter_names(), ["controller", "action", "id"]);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use regex::Regex;
use serde::{Deserialize, Serialize};

use waypost_core::{WaypostError, WaypostResult};

use crate::constraints::{validate_fragment, ConstraintTable};

/// Parameters extracted from, or supplied to, a route.
pub type Params = BTreeMap<String, String>;

/// One node of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Fixed text, matched verbatim.
    Literal { text: String },
    /// A named capture with its resolved constraint.
    Parameter { name: String, constraint: String },
    /// Child nodes that are present or absent as a unit.
    Optional { children: Vec<Segment> },
}

impl Segment {
    /// Returns `true` if this node or any descendant is a parameter.
    pub fn has_parameters(&self) -> bool {
        match self {
            Self::Literal { .. } => false,
            Self::Parameter { .. } => true,
            Self::Optional { children } => children.iter().any(Self::has_parameters),
        }
    }
}

/// Per-route configuration applied at compile time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    /// Values used for parameters absent from a path or from reverse-build input.
    pub defaults: Params,
    /// Constraints overriding inline and default ones.
    pub constraints: ConstraintTable,
}

impl RouteOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a default value.
    #[must_use]
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.constraints.insert(name, fragment);
        self
    }
}

/// A compiled routing rule.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RouteRepr", into = "RouteRepr")]
pub struct Route {
    /// The original pattern string
    pattern: String,
    /// The parsed pattern tree
    segments: Vec<Segment>,
    /// The anchored expression derived from `segments`
    expression: Regex,
    /// Capture group index for each entry of `parameter_names`
    capture_slots: Vec<usize>,
    /// Anchored constraint for each entry of `parameter_names`
    value_checks: Vec<Regex>,
    /// Default parameter values
    defaults: Params,
    /// Parameter names in order of first appearance
    parameter_names: Vec<String>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("expression", &self.expression.as_str())
            .field("parameter_names", &self.parameter_names)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.segments == other.segments
            && self.expression.as_str() == other.expression.as_str()
            && self.defaults == other.defaults
            && self.parameter_names == other.parameter_names
    }
}

impl Eq for Route {}

impl Route {
    /// Compiles a pattern with no defaults or constraint overrides.
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::PatternSyntax`] if the pattern is malformed.
    pub fn compile(pattern: &str) -> WaypostResult<Self> {
        Self::compile_with(pattern, &RouteOptions::default())
    }

    /// Compiles a pattern with the given defaults and constraints.
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::PatternSyntax`] if the pattern is malformed or a
    /// constraint is not a valid regex.
    pub fn compile_with(pattern: &str, options: &RouteOptions) -> WaypostResult<Self> {
        options.constraints.validate(pattern)?;

        let mut parser = Parser::new(pattern, &options.constraints);
        let segments = parser.parse()?;
        let parameter_names = parser.names;

        for (name, _) in options.constraints.iter() {
            if !parameter_names.iter().any(|n| n == name) {
                tracing::warn!(
                    pattern,
                    parameter = name,
                    "Constraint names a parameter the pattern does not declare"
                );
            }
        }

        let expression = expression_for(&segments);
        Self::assemble(
            pattern.to_string(),
            segments,
            &expression,
            options.defaults.clone(),
            parameter_names,
        )
    }

    /// Builds a route from its parts, compiling `expression` and locating the
    /// capture group of every parameter.
    fn assemble(
        pattern: String,
        segments: Vec<Segment>,
        expression: &str,
        defaults: Params,
        parameter_names: Vec<String>,
    ) -> WaypostResult<Self> {
        let regex = Regex::new(expression).map_err(|e| {
            WaypostError::pattern_syntax(&pattern, format!("invalid route expression: {e}"))
        })?;

        let capture_slots = (0..parameter_names.len())
            .map(|i| {
                let group = capture_name(i);
                regex
                    .capture_names()
                    .position(|n| n == Some(group.as_str()))
                    .ok_or_else(|| {
                        WaypostError::pattern_syntax(
                            &pattern,
                            format!("expression has no capture for '{}'", parameter_names[i]),
                        )
                    })
            })
            .collect::<WaypostResult<Vec<_>>>()?;

        let mut parameters = Vec::new();
        collect_parameters(&segments, &mut parameters);
        let value_checks = parameters
            .iter()
            .map(|(name, constraint)| {
                Regex::new(&format!("^(?:{constraint})$")).map_err(|e| {
                    WaypostError::pattern_syntax(
                        &pattern,
                        format!("invalid constraint for parameter '{name}': {e}"),
                    )
                })
            })
            .collect::<WaypostResult<Vec<_>>>()?;

        Ok(Self {
            pattern,
            segments,
            expression: regex,
            capture_slots,
            value_checks,
            defaults,
            parameter_names,
        })
    }

    /// Replaces the route's defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Params) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parsed pattern tree.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the compiled matching expression.
    pub const fn regex(&self) -> &Regex {
        &self.expression
    }

    /// Returns the matching expression source.
    pub fn matching_expression(&self) -> &str {
        self.expression.as_str()
    }

    /// Returns the default parameter values.
    pub const fn defaults(&self) -> &Params {
        &self.defaults
    }

    /// Returns the declared parameter names in order of first appearance.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Returns `true` if the pattern is plain literal text.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal { .. }))
    }

    /// Returns `true` if `value` is non-empty and satisfies the constraint of
    /// parameter `name`. Unknown names accept nothing.
    pub fn accepts(&self, name: &str, value: &str) -> bool {
        !value.is_empty()
            && self
                .parameter_names
                .iter()
                .position(|n| n == name)
                .is_some_and(|i| self.value_checks[i].is_match(value))
    }

    /// Pairs each parameter name with its capture group index.
    pub(crate) fn captures(&self) -> impl Iterator<Item = (&str, usize)> {
        self.parameter_names
            .iter()
            .map(String::as_str)
            .zip(self.capture_slots.iter().copied())
    }
}

/// Serialized form of a [`Route`].
#[derive(Serialize, Deserialize)]
struct RouteRepr {
    pattern: String,
    segments: Vec<Segment>,
    matching_expression: String,
    defaults: Params,
    parameter_names: Vec<String>,
}

impl From<Route> for RouteRepr {
    fn from(route: Route) -> Self {
        Self {
            matching_expression: route.expression.as_str().to_string(),
            pattern: route.pattern,
            segments: route.segments,
            defaults: route.defaults,
            parameter_names: route.parameter_names,
        }
    }
}

impl TryFrom<RouteRepr> for Route {
    type Error = WaypostError;

    fn try_from(repr: RouteRepr) -> Result<Self, Self::Error> {
        let mut parameters = Vec::new();
        collect_parameters(&repr.segments, &mut parameters);
        let declared: Vec<&str> = parameters.iter().map(|(name, _)| *name).collect();

        if declared != repr.parameter_names {
            return Err(WaypostError::SerializationError(format!(
                "parameter names of route '{}' do not match its segments",
                repr.pattern
            )));
        }
        if let Some((i, name)) = declared
            .iter()
            .enumerate()
            .find(|&(i, name)| declared[..i].contains(name))
        {
            return Err(WaypostError::SerializationError(format!(
                "route '{}' declares parameter '{name}' twice (position {i})",
                repr.pattern
            )));
        }

        let expression = expression_for(&repr.segments);
        if expression != repr.matching_expression {
            return Err(WaypostError::SerializationError(format!(
                "matching expression of route '{}' does not match its segments",
                repr.pattern
            )));
        }

        Self::assemble(
            repr.pattern,
            repr.segments,
            &expression,
            repr.defaults,
            repr.parameter_names,
        )
    }
}

/// Collects `(name, constraint)` for every parameter in tree order.
fn collect_parameters<'a>(segments: &'a [Segment], out: &mut Vec<(&'a str, &'a str)>) {
    for segment in segments {
        match segment {
            Segment::Literal { .. } => {}
            Segment::Parameter { name, constraint } => {
                out.push((name.as_str(), constraint.as_str()));
            }
            Segment::Optional { children } => collect_parameters(children, out),
        }
    }
}

// ============================================================
// Expression generation
// ============================================================

/// Capture group name for the `index`-th parameter. Parameter names may start
/// with a digit, which the regex engine does not accept as a group name.
fn capture_name(index: usize) -> String {
    format!("__p{index}")
}

/// Derives the anchored matching expression for a segment tree.
pub fn expression_for(segments: &[Segment]) -> String {
    let mut out = String::from("^");
    let mut index = 0;
    write_segments(segments, &mut out, &mut index);
    out.push('$');
    out
}

fn write_segments(segments: &[Segment], out: &mut String, index: &mut usize) {
    for segment in segments {
        match segment {
            Segment::Literal { text } => out.push_str(&regex::escape(text)),
            Segment::Parameter { constraint, .. } => {
                write!(out, "(?P<{}>{constraint})", capture_name(*index)).ok();
                *index += 1;
            }
            Segment::Optional { children } => {
                out.push_str("(?:");
                write_segments(children, out, index);
                out.push_str(")?");
            }
        }
    }
}

// ============================================================
// Parsing
// ============================================================

/// Recursive-descent parser producing the segment tree.
struct Parser<'a> {
    pattern: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    constraints: &'a ConstraintTable,
    names: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(pattern: &'a str, constraints: &'a ConstraintTable) -> Self {
        Self {
            pattern,
            chars: pattern.chars().peekable(),
            constraints,
            names: Vec::new(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> WaypostError {
        WaypostError::pattern_syntax(self.pattern, reason)
    }

    fn parse(&mut self) -> WaypostResult<Vec<Segment>> {
        self.parse_sequence(0)
    }

    /// Parses nodes until end of input (`depth == 0`) or the `)` closing the
    /// current group.
    fn parse_sequence(&mut self, depth: usize) -> WaypostResult<Vec<Segment>> {
        let mut segments = Vec::new();

        loop {
            match self.chars.next() {
                None if depth == 0 => return Ok(segments),
                None => return Err(self.error("unclosed optional group")),
                Some(')') if depth == 0 => {
                    return Err(self.error("unmatched ')' closing no optional group"))
                }
                Some(')') => return Ok(segments),
                Some('(') => {
                    let children = self.parse_sequence(depth + 1)?;
                    segments.push(Segment::Optional { children });
                }
                Some('<') => {
                    let parameter = self.parse_parameter()?;
                    segments.push(parameter);
                }
                Some(c) => push_literal(&mut segments, c),
            }
        }
    }

    /// Parses `name>` or `name:regex>` after an opening `<`.
    fn parse_parameter(&mut self) -> WaypostResult<Segment> {
        let mut name = String::new();
        let has_inline = loop {
            match self.chars.next() {
                None => return Err(self.error(format!("unclosed parameter '<{name}'"))),
                Some('>') => break false,
                Some(':') => break true,
                Some(c) => name.push(c),
            }
        };

        if name.is_empty() {
            return Err(self.error("empty parameter name"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(self.error(format!(
                "invalid parameter name '{name}': only [A-Za-z0-9_] are allowed"
            )));
        }
        if self.names.contains(&name) {
            return Err(self.error(format!("parameter '{name}' is declared twice")));
        }

        let inline = if has_inline {
            let fragment = self.parse_inline_constraint(&name)?;
            validate_fragment(self.pattern, &name, &fragment)?;
            Some(fragment)
        } else {
            None
        };

        let constraint = self
            .constraints
            .resolve(&name, inline.as_deref())
            .to_string();
        self.names.push(name.clone());

        Ok(Segment::Parameter { name, constraint })
    }

    /// Reads an inline regex up to the `>` that closes the parameter. A `>`
    /// inside a group, a character class, or after a backslash belongs to the
    /// regex.
    fn parse_inline_constraint(&mut self, name: &str) -> WaypostResult<String> {
        let mut fragment = String::new();
        let mut group_depth = 0usize;
        let mut in_class = false;

        loop {
            let Some(c) = self.chars.next() else {
                return Err(self.error(format!("unclosed parameter '<{name}:'")));
            };
            match c {
                '\\' => {
                    fragment.push(c);
                    if let Some(escaped) = self.chars.next() {
                        fragment.push(escaped);
                    }
                    continue;
                }
                '[' if !in_class => in_class = true,
                ']' if in_class => in_class = false,
                '(' if !in_class => group_depth += 1,
                ')' if !in_class => group_depth = group_depth.saturating_sub(1),
                '>' if !in_class && group_depth == 0 => return Ok(fragment),
                _ => {}
            }
            fragment.push(c);
        }
    }
}

fn push_literal(segments: &mut Vec<Segment>, c: char) {
    if let Some(Segment::Literal { text }) = segments.last_mut() {
        text.push(c);
    } else {
        segments.push(Segment::Literal {
            text: c.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::DEFAULT_SEGMENT;

    fn lit(text: &str) -> Segment {
        Segment::Literal {
            text: text.to_string(),
        }
    }

    fn param(name: &str, constraint: &str) -> Segment {
        Segment::Parameter {
            name: name.to_string(),
            constraint: constraint.to_string(),
        }
    }

    fn opt(children: Vec<Segment>) -> Segment {
        Segment::Optional { children }
    }

    #[test]
    fn test_compile_static() {
        let route = Route::compile("info/about_us").unwrap();
        assert_eq!(route.segments(), [lit("info/about_us")]);
        assert!(route.is_static());
        assert!(route.parameter_names().is_empty());
        assert_eq!(route.matching_expression(), "^info/about_us$");
    }

    #[test]
    fn test_compile_nested_groups() {
        let route = Route::compile("(<controller>(/<action>(/<id>)))").unwrap();
        assert_eq!(
            route.segments(),
            [opt(vec![
                param("controller", DEFAULT_SEGMENT),
                opt(vec![
                    lit("/"),
                    param("action", DEFAULT_SEGMENT),
                    opt(vec![lit("/"), param("id", DEFAULT_SEGMENT)]),
                ]),
            ])]
        );
        assert_eq!(route.parameter_names(), ["controller", "action", "id"]);
        assert!(!route.is_static());
    }

    #[test]
    fn test_expression_shape() {
        let route = Route::compile("admin(/<controller>)").unwrap();
        assert_eq!(
            route.matching_expression(),
            "^admin(?:/(?P<__p0>[^/]+))?$"
        );
    }

    #[test]
    fn test_literals_are_escaped() {
        let route = Route::compile("feed.xml").unwrap();
        assert_eq!(route.matching_expression(), r"^feed\.xml$");
    }

    #[test]
    fn test_inline_constraint() {
        let route = Route::compile(r"users/<id:\d+>").unwrap();
        assert_eq!(route.segments()[1], param("id", r"\d+"));
    }

    #[test]
    fn test_inline_constraint_with_groups_and_classes() {
        let route = Route::compile("files/<path:(?:[^>]|x)+>.<ext:(json|xml)>").unwrap();
        assert_eq!(route.segments()[1], param("path", "(?:[^>]|x)+"));
        assert_eq!(route.segments()[3], param("ext", "(json|xml)"));
    }

    #[test]
    fn test_constraint_table_overrides_inline() {
        let options = RouteOptions::new().constraint("id", "[0-9]{2}");
        let route = Route::compile_with(r"users/<id:\d+>", &options).unwrap();
        assert_eq!(route.segments()[1], param("id", "[0-9]{2}"));
    }

    #[test]
    fn test_digit_leading_parameter_name() {
        let route = Route::compile("<1st>/<2nd>").unwrap();
        assert_eq!(route.parameter_names(), ["1st", "2nd"]);
    }

    #[test]
    fn test_unclosed_group() {
        let err = Route::compile("admin(/<controller>").unwrap_err();
        assert!(err.is_pattern_error());
        assert!(err.to_string().contains("unclosed optional group"));
    }

    #[test]
    fn test_unmatched_close() {
        let err = Route::compile("admin)/<controller>").unwrap_err();
        assert!(err.to_string().contains("unmatched ')'"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = Route::compile("<id>/(<id>)").unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_invalid_parameter_name() {
        assert!(Route::compile("users/<user-id>").is_err());
        assert!(Route::compile("users/<>").is_err());
        assert!(Route::compile("users/<na me>").is_err());
    }

    #[test]
    fn test_unclosed_parameter() {
        assert!(Route::compile("users/<id").is_err());
        assert!(Route::compile(r"users/<id:\d+").is_err());
    }

    #[test]
    fn test_invalid_inline_regex() {
        let err = Route::compile("users/<id:[0-9>").unwrap_err();
        assert!(err.is_pattern_error());
    }

    #[test]
    fn test_defaults_are_kept() {
        let options = RouteOptions::new().default_value("controller", "welcome");
        let route = Route::compile_with("(<controller>)", &options).unwrap();
        assert_eq!(route.defaults().get("controller").unwrap(), "welcome");
    }

    #[test]
    fn test_with_defaults_replaces() {
        let mut defaults = Params::new();
        defaults.insert("action".into(), "index".into());
        let route = Route::compile("(<action>)").unwrap().with_defaults(defaults);
        assert_eq!(route.defaults().len(), 1);
    }

    #[test]
    fn test_serde_roundtrip_preserves_compiled_state() {
        let options = RouteOptions::new()
            .default_value("controller", "welcome")
            .constraint("id", r"\d+");
        let route = Route::compile_with("(<controller>(/<action>(/<id>)))", &options).unwrap();

        let json = serde_json::to_string(&route).unwrap();
        assert!(json.contains("matching_expression"));
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(back, route);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_names() {
        let route = Route::compile("<a>/<b>").unwrap();
        let mut value = serde_json::to_value(&route).unwrap();
        value["parameter_names"] = serde_json::json!(["b", "a"]);
        assert!(serde_json::from_value::<Route>(value).is_err());
    }

    #[test]
    fn test_deserialize_rejects_edited_expression() {
        let route = Route::compile("users/<x>").unwrap();
        let mut value = serde_json::to_value(&route).unwrap();
        value["matching_expression"] = serde_json::json!("^(?P<__p0>.*)$");
        let err = serde_json::from_value::<Route>(value).unwrap_err();
        assert!(err.to_string().contains("matching expression"));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_names() {
        let route = Route::compile("<a>/<b>").unwrap();
        let mut value = serde_json::to_value(&route).unwrap();
        value["segments"][2]["name"] = serde_json::json!("a");
        value["parameter_names"] = serde_json::json!(["a", "a"]);
        let err = serde_json::from_value::<Route>(value).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_accepts_checks_constraint() {
        let options = RouteOptions::new().constraint("id", r"\d+");
        let route = Route::compile_with("users/<id>(/<slug:.*>)", &options).unwrap();
        assert!(route.accepts("id", "42"));
        assert!(!route.accepts("id", "4x"));
        assert!(!route.accepts("slug", ""));
        assert!(route.accepts("slug", "a/b"));
        assert!(!route.accepts("missing", "42"));
    }

    #[test]
    fn test_segment_has_parameters() {
        assert!(!opt(vec![lit("x")]).has_parameters());
        assert!(opt(vec![opt(vec![param("a", "x")])]).has_parameters());
    }

    #[test]
    fn test_debug_output() {
        let route = Route::compile("users/<id>").unwrap();
        let debug = format!("{route:?}");
        assert!(debug.contains("users/<id>"));
    }
}
