//! Annotation scanning for role tokens in doc text.
//!
//! Every declaration the generator cares about is marked in its doc comments with a role token
//! of the form `<namespace>:<kind>`. The scanner finds the first such token and hands back a
//! [`Role`] carrying the raw argument text; the role-specific argument grammars live here too.
//!
//! ```text
//! /// lambdagen:service base_path=/api
//! /// lambdagen:service_init
//! /// lambdagen:handler GET /employees/{id}
//! /// lambdagen:"pathvar,id"
//! ```

use crate::error::{Error, Result};
use crate::model::HttpMethod;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use syn::{Attribute, Expr, Lit, Meta};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "lambdagen";

static SERVICE_ARG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z_]\w*)=(\S+)").unwrap());

static HANDLER_ARG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(GET|POST|PUT|PATCH|DELETE)\s+(\S+)$").unwrap());

/// A `<namespace>:<body>` token at a word start. A quoted body may contain spaces.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)([^\s:"]+):(?:"([^"]*)"|(\S*))"#).unwrap());

/// The closed set of roles a declaration can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    ServiceType,
    ServiceInit,
    Handler,
    PathVar,
    QueryVar,
    Body,
}

impl RoleKind {
    /// Parses the `<kind>` part of a role token
    pub fn from_token(kind: &str) -> Option<Self> {
        match kind {
            "service" => Some(RoleKind::ServiceType),
            "service_init" => Some(RoleKind::ServiceInit),
            "handler" => Some(RoleKind::Handler),
            "pathvar" => Some(RoleKind::PathVar),
            "queryvar" => Some(RoleKind::QueryVar),
            "body" => Some(RoleKind::Body),
            _ => None,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            RoleKind::ServiceType => "service",
            RoleKind::ServiceInit => "service_init",
            RoleKind::Handler => "handler",
            RoleKind::PathVar => "pathvar",
            RoleKind::QueryVar => "queryvar",
            RoleKind::Body => "body",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// A role found in annotation text, with its arguments left unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub kind: RoleKind,
    pub args: String,
}

/// Finds role tokens for a single annotation namespace.
#[derive(Debug, Clone)]
pub struct AnnotationScanner {
    namespace: String,
}

impl Default for AnnotationScanner {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl AnnotationScanner {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Scans the doc attributes of a declaration
    pub fn scan_attrs(&self, attrs: &[Attribute]) -> Option<Role> {
        self.scan(&doc_text(attrs))
    }

    /// Scans annotation text line by line and returns the first valid role.
    ///
    /// Tokens in this namespace with an unknown kind are skipped. Additional role tokens after
    /// the first one are not inspected.
    pub fn scan(&self, text: &str) -> Option<Role> {
        for line in text.lines() {
            for captures in TOKEN_RE.captures_iter(line) {
                if captures[1] != self.namespace {
                    continue;
                }

                let body = match (captures.get(2), captures.get(3)) {
                    (Some(quoted), _) => quoted.as_str(),
                    (None, Some(bare)) => bare.as_str().trim_matches('"'),
                    (None, None) => continue,
                };
                let (kind, inline_args) = match body.split_once(',') {
                    Some((kind, rest)) => (kind, Some(rest)),
                    None => (body, None),
                };

                let Some(kind) = RoleKind::from_token(kind.trim()) else {
                    continue;
                };

                let token_end = captures.get(0).map_or(line.len(), |m| m.end());
                let args = match inline_args {
                    Some(inline) => inline.trim().to_string(),
                    None => trailing_args(&line[token_end..]),
                };

                return Some(Role { kind, args });
            }
        }

        None
    }
}

/// Joins the `#[doc = "..."]` attributes of an item into one string, one line per attribute
pub fn doc_text(attrs: &[Attribute]) -> String {
    let mut lines = Vec::new();

    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }

        if let Meta::NameValue(name_value) = &attr.meta {
            if let Expr::Lit(expr_lit) = &name_value.value {
                if let Lit::Str(lit_str) = &expr_lit.lit {
                    lines.push(lit_str.value());
                }
            }
        }
    }

    lines.join("\n")
}

/// Everything after the role token on the same line; a leading `::` separator is dropped
fn trailing_args(rest: &str) -> String {
    let rest = rest.trim();
    match rest.strip_prefix("::") {
        Some(after) => after.trim().to_string(),
        None => rest.to_string(),
    }
}

/// Parses service arguments: whitespace separated `key=value` pairs, last write wins.
pub fn parse_service_args(args: &str) -> BTreeMap<String, String> {
    let mut config = BTreeMap::new();
    for captures in SERVICE_ARG_RE.captures_iter(args) {
        config.insert(captures[1].to_string(), captures[2].to_string());
    }
    config
}

/// Method and path carried by a handler role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRoute {
    pub method: HttpMethod,
    pub path: String,
}

/// Parses handler arguments of the form `<METHOD> <path>`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the text is empty, the verb is outside the supported set, or
/// anything follows the path.
pub fn parse_handler_args(declaration: &str, args: &str) -> Result<HandlerRoute> {
    let captures = HANDLER_ARG_RE.captures(args.trim()).ok_or_else(|| {
        Error::parse(
            declaration,
            format!("expected `<METHOD> <path>` after handler role, got `{}`", args.trim()),
        )
    })?;

    let method = HttpMethod::from_verb(&captures[1])
        .ok_or_else(|| Error::parse(declaration, format!("unsupported method `{}`", &captures[1])))?;

    Ok(HandlerRoute {
        method,
        path: captures[2].to_string(),
    })
}

/// Returns the external-name override of a field role, if one was given
pub fn parse_field_args(args: &str) -> Option<String> {
    let name = args.split(',').next().unwrap_or("").trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
