//! Semantic model produced from annotated declarations.
//!
//! These types are independent of `syn`: the builder translates syntax into them, and the
//! coordinator, code synthesizer and metadata emitter only ever see this model.

use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods a handler may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parses an upper-case verb
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type or function name together with the Rust module path it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Module path such as `my_crate::employees`
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Full path usable from outside the crate
    pub fn path(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// An unresolved reference to a type, as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpression {
    /// A bare name such as `u32` or `NewEmployee`
    Identifier(String),
    /// A path such as `std::string::String` or `models::NewEmployee`
    QualifiedReference { namespace: String, name: String },
}

impl TypeExpression {
    /// Builds a type expression from a plain, non-generic type path.
    ///
    /// Returns `None` for every other shape (references, generics, tuples, qualified self).
    pub fn from_type(ty: &syn::Type) -> Option<Self> {
        let syn::Type::Path(type_path) = ty else {
            return None;
        };

        if type_path.qself.is_some() {
            return None;
        }

        let path = &type_path.path;
        if path
            .segments
            .iter()
            .any(|segment| !segment.arguments.is_none())
        {
            return None;
        }

        let mut segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        let name = segments.pop()?;

        if segments.is_empty() && path.leading_colon.is_none() {
            return Some(TypeExpression::Identifier(name));
        }

        let mut namespace = segments.join("::");
        if path.leading_colon.is_some() {
            namespace = format!("::{}", namespace);
        }

        Some(TypeExpression::QualifiedReference { namespace, name })
    }

    pub fn name(&self) -> &str {
        match self {
            TypeExpression::Identifier(name) => name,
            TypeExpression::QualifiedReference { name, .. } => name,
        }
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpression::Identifier(name) => f.write_str(name),
            TypeExpression::QualifiedReference { namespace, name } => {
                write!(f, "{}::{}", namespace, name)
            }
        }
    }
}

/// Integer primitives a request variable may be declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
}

impl IntegerKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "i8" => Some(IntegerKind::I8),
            "i16" => Some(IntegerKind::I16),
            "i32" => Some(IntegerKind::I32),
            "i64" => Some(IntegerKind::I64),
            "i128" => Some(IntegerKind::I128),
            "isize" => Some(IntegerKind::Isize),
            "u8" => Some(IntegerKind::U8),
            "u16" => Some(IntegerKind::U16),
            "u32" => Some(IntegerKind::U32),
            "u64" => Some(IntegerKind::U64),
            "u128" => Some(IntegerKind::U128),
            "usize" => Some(IntegerKind::Usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegerKind::I8 => "i8",
            IntegerKind::I16 => "i16",
            IntegerKind::I32 => "i32",
            IntegerKind::I64 => "i64",
            IntegerKind::I128 => "i128",
            IntegerKind::Isize => "isize",
            IntegerKind::U8 => "u8",
            IntegerKind::U16 => "u16",
            IntegerKind::U32 => "u32",
            IntegerKind::U64 => "u64",
            IntegerKind::U128 => "u128",
            IntegerKind::Usize => "usize",
        }
    }
}

/// Resolved type of a path or query variable; selects the coercion branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Integer(IntegerKind),
    Boolean,
}

/// What a request variable deserializes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableType {
    /// Path and query variables
    Scalar(ScalarType),
    /// The request body, decoded from JSON
    Struct(QualifiedName),
}

/// One annotated field of a request-config struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Name of the variable as it appears in the request
    pub external_name: String,
    pub ty: VariableType,
    /// Field of the request-config struct that receives the value
    pub field_name: String,
}

/// Expected path, query and body inputs of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub type_ref: QualifiedName,
    pub path_variables: Vec<VariableDefinition>,
    pub query_variables: Vec<VariableDefinition>,
    pub request_body: Option<VariableDefinition>,
    /// Fields without a role, filled from `Default` in generated code
    pub has_unannotated_fields: bool,
}

impl RequestConfig {
    pub fn new(type_ref: QualifiedName) -> Self {
        Self {
            type_ref,
            path_variables: Vec::new(),
            query_variables: Vec::new(),
            request_body: None,
            has_unannotated_fields: false,
        }
    }
}

/// How the request context is handed to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPassing {
    ByValue,
    ByReference,
}

/// What a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// `Result<T, E>`: `Ok` is the response body, `Err` becomes an API error
    Result,
    /// Any other type, always a success body
    Plain,
}

/// Signature facts the code synthesizer needs to invoke a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerSignature {
    pub is_async: bool,
    pub context: ContextPassing,
    pub returns: ReturnShape,
}

/// One endpoint mapped to a method on a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDefinition {
    /// Name of the owning service type
    pub service: String,
    pub method: HttpMethod,
    pub path: String,
    pub request_config: Option<RequestConfig>,
    /// Method name on the service
    pub function: String,
    pub signature: HandlerSignature,
}

/// How the initializer is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDefinition {
    pub function: QualifiedName,
    /// Associated function on the service rather than a free function
    pub associated: bool,
    pub is_async: bool,
}

impl InitializerDefinition {
    /// Call path, `Type::new` for associated functions and `module::new_x` otherwise
    pub fn call_path(&self, service: &QualifiedName) -> String {
        if self.associated {
            format!("{}::{}", service.path(), self.function.name)
        } else {
            self.function.path()
        }
    }
}

/// A service type with its initializer and handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub type_ref: QualifiedName,
    pub config: BTreeMap<String, String>,
    pub initializer: InitializerDefinition,
    pub handlers: Vec<HandlerDefinition>,
}

/// Service configuration key holding the route prefix
pub const BASE_PATH_KEY: &str = "base_path";

impl ServiceDefinition {
    pub fn name(&self) -> &str {
        &self.type_ref.name
    }

    pub fn base_path(&self) -> Option<&str> {
        self.config.get(BASE_PATH_KEY).map(String::as_str)
    }

    /// Handler path prefixed by the configured base path, if any, in clean form
    pub fn effective_path(&self, handler: &HandlerDefinition) -> String {
        combine_paths(self.base_path().unwrap_or_default(), &handler.path)
    }
}

/// Combine a prefix and path, handling slashes correctly
pub fn combine_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return clean_path(path);
    }
    clean_path(&format!("{}/{}", prefix, path))
}

/// Lexically cleans a route path: repeated and trailing slashes go, `.` segments are dropped
/// and `..` removes the segment before it.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Converts a field name into lower camel case (`user_id` and `UserId` both become `userId`)
pub fn to_lower_camel(name: &str) -> String {
    let words = split_words(name);
    let mut out = String::with_capacity(name.len());

    for (idx, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if idx == 0 {
            out.push_str(&lower);
            continue;
        }

        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }

    out
}

fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[idx - 1];
            let next_is_lower = chars.get(idx + 1).is_some_and(|c| c.is_lowercase());
            // `userId` splits before `I`; `HTTPServer` splits before `S`
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(ch);
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lower_camel() {
        assert_eq!(to_lower_camel("UserId"), "userId");
        assert_eq!(to_lower_camel("user_id"), "userId");
        assert_eq!(to_lower_camel("id"), "id");
        assert_eq!(to_lower_camel("ID"), "id");
        assert_eq!(to_lower_camel("HTTPServer"), "httpServer");
        assert_eq!(to_lower_camel("page_size_2"), "pageSize2");
        assert_eq!(to_lower_camel("_private"), "private");
    }

    #[test]
    fn test_combine_paths() {
        assert_eq!(combine_paths("/api", "/employees/{id}"), "/api/employees/{id}");
        assert_eq!(combine_paths("/api/", "/employees"), "/api/employees");
        assert_eq!(combine_paths("/api", "employees"), "/api/employees");
        assert_eq!(combine_paths("/api", "/"), "/api");
        assert_eq!(combine_paths("", "/employees"), "/employees");
        assert_eq!(combine_paths("/", "/"), "/");
        assert_eq!(combine_paths("/api/", "/employees/"), "/api/employees");
        assert_eq!(combine_paths("/api", "//employees//{id}"), "/api/employees/{id}");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/employees/"), "/employees");
        assert_eq!(clean_path("/employees//{id}"), "/employees/{id}");
        assert_eq!(clean_path("/hr/./employees/../staff"), "/hr/staff");
        assert_eq!(clean_path("/.."), "/");
        assert_eq!(clean_path("employees/"), "employees");
        assert_eq!(clean_path("/"), "/");
    }

    #[test]
    fn test_type_expression_shapes() {
        let ty: syn::Type = syn::parse_quote!(u32);
        assert_eq!(
            TypeExpression::from_type(&ty),
            Some(TypeExpression::Identifier("u32".to_string()))
        );

        let ty: syn::Type = syn::parse_quote!(std::string::String);
        assert_eq!(
            TypeExpression::from_type(&ty),
            Some(TypeExpression::QualifiedReference {
                namespace: "std::string".to_string(),
                name: "String".to_string(),
            })
        );

        let invalid: [syn::Type; 4] = [
            syn::parse_quote!(Vec<String>),
            syn::parse_quote!(&str),
            syn::parse_quote!((u32, u32)),
            syn::parse_quote!(<T as Trait>::Output),
        ];
        for ty in &invalid {
            assert_eq!(TypeExpression::from_type(ty), None);
        }
    }

    #[test]
    fn test_http_method_round_trip() {
        for verb in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            assert_eq!(HttpMethod::from_verb(verb).unwrap().as_str(), verb);
        }
        assert_eq!(HttpMethod::from_verb("HEAD"), None);
    }

    #[test]
    fn test_effective_path_and_call_path() {
        let service = ServiceDefinition {
            type_ref: QualifiedName::new("hr::employees", "Employees"),
            config: BTreeMap::from([(BASE_PATH_KEY.to_string(), "/hr".to_string())]),
            initializer: InitializerDefinition {
                function: QualifiedName::new("hr::employees", "new"),
                associated: true,
                is_async: false,
            },
            handlers: Vec::new(),
        };
        let handler = HandlerDefinition {
            service: "Employees".to_string(),
            method: HttpMethod::Get,
            path: "/employees/{id}".to_string(),
            request_config: None,
            function: "get".to_string(),
            signature: HandlerSignature {
                is_async: false,
                context: ContextPassing::ByReference,
                returns: ReturnShape::Result,
            },
        };

        assert_eq!(service.effective_path(&handler), "/hr/employees/{id}");
        assert_eq!(
            service.initializer.call_path(&service.type_ref),
            "hr::employees::Employees::new"
        );
    }
}
