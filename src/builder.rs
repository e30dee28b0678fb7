use crate::annotation::{self, AnnotationScanner, RoleKind};
use crate::error::{Error, Result};
use crate::model::{
    to_lower_camel, ContextPassing, HandlerDefinition, HandlerSignature, InitializerDefinition,
    QualifiedName, RequestConfig, ReturnShape, ServiceDefinition, TypeExpression, VariableDefinition,
    VariableType,
};
use crate::parser::ParsedFile;
use crate::type_resolver::{IndexedStruct, ModuleIndex};
use log::{debug, info, warn};
use quote::ToTokens;
use syn::{FnArg, GenericArgument, PathArguments, ReturnType, Signature, Type};

/// Request context types a handler may take as its first parameter
const CONTEXT_PATHS: &[&str] = &["Context", "lambda_http::Context", "lambda_runtime::Context"];

/// Builds the semantic model of one module from its parsed files.
///
/// Declaration-level problems (a malformed handler, an unsupported field type) exclude only the
/// offending declaration and are collected in [`BuildOutcome::skipped`]. A service without
/// exactly one valid initializer fails the whole module.
pub struct SemanticModelBuilder<'a> {
    scanner: &'a AnnotationScanner,
    index: ModuleIndex,
}

/// Services discovered in a module plus the declarations that were left out.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub services: Vec<ServiceDefinition>,
    pub skipped: Vec<Error>,
}

impl BuildOutcome {
    pub fn handler_count(&self) -> usize {
        self.services.iter().map(|s| s.handlers.len()).sum()
    }
}

/// A function tagged as an initializer, before it is matched to a service.
struct InitializerCandidate {
    declaration: String,
    function: QualifiedName,
    /// Implementing type for associated functions
    impl_self: Option<String>,
    signature: Signature,
}

impl<'a> SemanticModelBuilder<'a> {
    pub fn new(scanner: &'a AnnotationScanner, parsed_files: &[ParsedFile]) -> Self {
        Self {
            scanner,
            index: ModuleIndex::new(parsed_files),
        }
    }

    pub fn build(&self) -> Result<BuildOutcome> {
        let mut outcome = BuildOutcome::default();

        let service_structs = self.discover_services(&mut outcome.skipped);
        let candidates = self.initializer_candidates();
        self.report_orphans(&service_structs, &candidates, &mut outcome.skipped);

        for service_struct in service_structs {
            let name = service_struct.name();
            let role_args = self
                .scanner
                .scan_attrs(&service_struct.item.attrs)
                .map(|role| role.args)
                .unwrap_or_default();

            let initializer = self.find_initializer(&name, &candidates)?;
            let handlers = self.discover_handlers(&name, &mut outcome.skipped);

            info!(
                "Found service {} with {} handler(s)",
                service_struct.qualified_name(),
                handlers.len()
            );

            outcome.services.push(ServiceDefinition {
                type_ref: service_struct.qualified_name(),
                config: annotation::parse_service_args(&role_args),
                initializer,
                handlers,
            });
        }

        for error in &outcome.skipped {
            warn!("Skipped: {}", error);
        }

        Ok(outcome)
    }

    /// Structs carrying the service role, in source order
    fn discover_services(&self, skipped: &mut Vec<Error>) -> Vec<&IndexedStruct> {
        let mut services = Vec::new();

        for indexed in &self.index.structs {
            let Some(role) = self.scanner.scan_attrs(&indexed.item.attrs) else {
                continue;
            };

            match role.kind {
                RoleKind::ServiceType => {
                    debug!("Service candidate: {}", indexed.qualified_name());
                    services.push(indexed);
                }
                other => skipped.push(Error::validation(
                    indexed.qualified_name().path(),
                    format!("role `{}` is not valid on a struct", other),
                )),
            }
        }

        services
    }

    fn initializer_candidates(&self) -> Vec<InitializerCandidate> {
        let mut candidates = Vec::new();

        for function in &self.index.functions {
            if self.has_role(&function.item.attrs, RoleKind::ServiceInit) {
                let name = QualifiedName::new(function.namespace.clone(), function.item.sig.ident.to_string());
                candidates.push(InitializerCandidate {
                    declaration: name.path(),
                    function: name,
                    impl_self: None,
                    signature: function.item.sig.clone(),
                });
            }
        }

        for indexed_impl in &self.index.impls {
            for method in &indexed_impl.methods {
                if self.has_role(&method.attrs, RoleKind::ServiceInit) {
                    candidates.push(InitializerCandidate {
                        declaration: format!("{}::{}", indexed_impl.self_type, method.sig.ident),
                        function: QualifiedName::new(indexed_impl.namespace.clone(), method.sig.ident.to_string()),
                        impl_self: Some(indexed_impl.self_type.clone()),
                        signature: method.sig.clone(),
                    });
                }
            }
        }

        candidates
    }

    /// Records tagged initializers and handlers that can never be attached to a service
    fn report_orphans(
        &self,
        services: &[&IndexedStruct],
        candidates: &[InitializerCandidate],
        skipped: &mut Vec<Error>,
    ) {
        let is_service = |name: &str| services.iter().any(|s| s.item.ident == name);

        for candidate in candidates {
            let target = initializer_target(&candidate.signature, candidate.impl_self.as_deref());
            if !target.as_deref().is_some_and(is_service) {
                skipped.push(Error::validation(
                    &candidate.declaration,
                    "initializer does not return any service type",
                ));
            }
        }

        for function in &self.index.functions {
            if self.has_role(&function.item.attrs, RoleKind::Handler) {
                skipped.push(Error::validation(
                    format!("{}::{}", function.namespace, function.item.sig.ident),
                    "handler must be a method of a service, not a free function",
                ));
            }
        }

        for indexed_impl in &self.index.impls {
            if is_service(&indexed_impl.self_type) {
                continue;
            }
            for method in &indexed_impl.methods {
                if self.has_role(&method.attrs, RoleKind::Handler) {
                    skipped.push(Error::validation(
                        format!("{}::{}", indexed_impl.self_type, method.sig.ident),
                        format!("`{}` is not a service", indexed_impl.self_type),
                    ));
                }
            }
        }
    }

    /// Finds the single initializer of a service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when no initializer or more than one targets the service,
    /// or when a tagged function names the service but has the wrong signature.
    fn find_initializer(&self, service: &str, candidates: &[InitializerCandidate]) -> Result<InitializerDefinition> {
        let mut found = Vec::new();

        for candidate in candidates {
            if candidate.impl_self.as_deref().is_some_and(|s| s != service) {
                continue;
            }
            if initializer_target(&candidate.signature, candidate.impl_self.as_deref()).as_deref() != Some(service) {
                continue;
            }

            check_initializer_signature(&candidate.signature, candidate.impl_self.as_deref())
                .map_err(|message| Error::validation(&candidate.declaration, message))?;

            found.push(candidate);
        }

        match found.as_slice() {
            [] => Err(Error::validation(service, "no initializer found for service")),
            [candidate] => {
                debug!("Initializer for {}: {}", service, candidate.declaration);
                Ok(InitializerDefinition {
                    function: candidate.function.clone(),
                    associated: candidate.impl_self.is_some(),
                    is_async: candidate.signature.asyncness.is_some(),
                })
            }
            many => {
                let names: Vec<&str> = many.iter().map(|c| c.declaration.as_str()).collect();
                Err(Error::validation(
                    service,
                    format!("multiple initializers found: {}", names.join(", ")),
                ))
            }
        }
    }

    fn discover_handlers(&self, service: &str, skipped: &mut Vec<Error>) -> Vec<HandlerDefinition> {
        let mut handlers = Vec::new();

        for indexed_impl in self.index.impls_of(service) {
            for method in &indexed_impl.methods {
                let Some(role) = self.scanner.scan_attrs(&method.attrs) else {
                    continue;
                };
                if role.kind != RoleKind::Handler {
                    continue;
                }

                let declaration = format!("{}::{}", service, method.sig.ident);
                match self.build_handler(service, &indexed_impl.namespace, &declaration, &method.sig, &role.args) {
                    Ok(handler) => {
                        debug!("Handler {} -> {} {}", declaration, handler.method, handler.path);
                        handlers.push(handler);
                    }
                    Err(e) => skipped.push(e),
                }
            }
        }

        handlers
    }

    fn build_handler(
        &self,
        service: &str,
        namespace: &str,
        declaration: &str,
        sig: &Signature,
        args: &str,
    ) -> Result<HandlerDefinition> {
        let route = annotation::parse_handler_args(declaration, args)?;

        match sig.receiver() {
            None => return Err(Error::validation(declaration, "handler must take `self` as receiver")),
            Some(receiver) if !is_plain_receiver(receiver) => {
                return Err(Error::validation(
                    declaration,
                    format!(
                        "receiver must be `self`, `&self` or `&mut self`, found `{}`",
                        receiver.to_token_stream()
                    ),
                ));
            }
            Some(_) => {}
        }

        let params: Vec<&Type> = sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Typed(pat_type) => Some(pat_type.ty.as_ref()),
                FnArg::Receiver(_) => None,
            })
            .collect();

        if params.is_empty() || params.len() > 2 {
            return Err(Error::validation(
                declaration,
                format!("handler takes a context and an optional request config, found {} parameter(s)", params.len()),
            ));
        }

        let context = context_passing(params[0]).ok_or_else(|| {
            Error::validation(
                declaration,
                format!("first parameter must be the request context, found `{}`", type_text(params[0])),
            )
        })?;

        let returns = match &sig.output {
            ReturnType::Default => {
                return Err(Error::validation(declaration, "handler must return a value"));
            }
            ReturnType::Type(_, ty) if last_segment_is(ty, "Result") => ReturnShape::Result,
            ReturnType::Type(..) => ReturnShape::Plain,
        };

        let request_config = match params.get(1) {
            Some(ty) => Some(self.build_request_config(namespace, declaration, ty)?),
            None => None,
        };

        Ok(HandlerDefinition {
            service: service.to_string(),
            method: route.method,
            path: route.path,
            request_config,
            function: sig.ident.to_string(),
            signature: HandlerSignature {
                is_async: sig.asyncness.is_some(),
                context,
                returns,
            },
        })
    }

    fn build_request_config(&self, namespace: &str, declaration: &str, ty: &Type) -> Result<RequestConfig> {
        let expr = TypeExpression::from_type(ty).ok_or_else(|| {
            Error::validation(
                declaration,
                format!("request config must be a plain struct type, found `{}`", type_text(ty)),
            )
        })?;

        let config_struct = self.index.find_struct(namespace, &expr).ok_or_else(|| {
            Error::validation(declaration, format!("request config struct `{}` not found", expr))
        })?;

        let syn::Fields::Named(fields) = &config_struct.item.fields else {
            if matches!(config_struct.item.fields, syn::Fields::Unit) {
                return Ok(RequestConfig::new(config_struct.qualified_name()));
            }
            return Err(Error::validation(
                declaration,
                format!("request config `{}` must have named fields", expr),
            ));
        };

        let mut config = RequestConfig::new(config_struct.qualified_name());
        let struct_namespace = config_struct.namespace.as_str();

        for field in &fields.named {
            let Some(ident) = &field.ident else {
                continue;
            };
            let field_name = ident.to_string();
            let field_decl = format!("{}.{}", config_struct.name(), field_name);

            let Some(role) = self.scanner.scan_attrs(&field.attrs) else {
                config.has_unannotated_fields = true;
                continue;
            };

            let external_name = annotation::parse_field_args(&role.args).unwrap_or_else(|| to_lower_camel(&field_name));

            match role.kind {
                RoleKind::PathVar | RoleKind::QueryVar => {
                    let scalar = self.index.resolve_scalar(struct_namespace, &field.ty).ok_or_else(|| {
                        Error::UnsupportedType {
                            field: field_decl.clone(),
                            type_name: type_text(&field.ty),
                        }
                    })?;

                    let variable = VariableDefinition {
                        external_name,
                        ty: VariableType::Scalar(scalar),
                        field_name,
                    };
                    if role.kind == RoleKind::PathVar {
                        config.path_variables.push(variable);
                    } else {
                        config.query_variables.push(variable);
                    }
                }
                RoleKind::Body => {
                    let body_expr = TypeExpression::from_type(&field.ty).ok_or_else(|| {
                        Error::validation(
                            &field_decl,
                            format!("body must be a plain struct type, found `{}`", type_text(&field.ty)),
                        )
                    })?;
                    let body_type = self.index.resolve_type_name(struct_namespace, &body_expr).ok_or_else(|| {
                        Error::validation(&field_decl, format!("body type `{}` not found", body_expr))
                    })?;

                    if let Some(previous) = &config.request_body {
                        warn!(
                            "{}: body field `{}` replaces earlier body field `{}`",
                            declaration, field_name, previous.field_name
                        );
                    }

                    config.request_body = Some(VariableDefinition {
                        external_name,
                        ty: VariableType::Struct(body_type),
                        field_name,
                    });
                }
                RoleKind::ServiceType | RoleKind::ServiceInit | RoleKind::Handler => {
                    return Err(Error::validation(
                        &field_decl,
                        format!("role `{}` is not valid on a field", role.kind),
                    ));
                }
            }
        }

        Ok(config)
    }

    fn has_role(&self, attrs: &[syn::Attribute], kind: RoleKind) -> bool {
        self.scanner.scan_attrs(attrs).is_some_and(|role| role.kind == kind)
    }
}

/// Name of the service type an initializer produces, looking through `Result`, `Box` and `Self`
fn initializer_target(sig: &Signature, impl_self: Option<&str>) -> Option<String> {
    let ReturnType::Type(_, ty) = &sig.output else {
        return None;
    };

    let produced = match generic_args(ty, "Result") {
        Some(args) => args.into_iter().next()?,
        None => ty.as_ref(),
    };
    let produced = generic_args(produced, "Box")
        .and_then(|args| args.into_iter().next())
        .unwrap_or(produced);

    let name = last_segment_ident(produced)?;
    if name == "Self" {
        impl_self.map(str::to_string)
    } else {
        Some(name)
    }
}

/// Checks the `Result<S, E>` contract of an initializer already known to target a service
fn check_initializer_signature(sig: &Signature, impl_self: Option<&str>) -> std::result::Result<(), String> {
    let ReturnType::Type(_, ty) = &sig.output else {
        return Err("initializer must return `Result<Service, Error>`".to_string());
    };

    let args = generic_args(ty, "Result").ok_or("initializer must return `Result<Service, Error>`")?;
    if args.len() != 2 {
        return Err(format!("initializer result must have exactly two type arguments, found {}", args.len()));
    }

    if sig.receiver().is_some() {
        return Err("initializer must not take `self`".to_string());
    }
    if impl_self.is_none() && last_segment_ident(args[0]).as_deref() == Some("Self") {
        return Err("`Self` is only valid in an associated initializer".to_string());
    }

    if !is_error_like(args[1]) {
        return Err(format!("`{}` is not an error type", type_text(args[1])));
    }

    Ok(())
}

fn is_error_like(ty: &Type) -> bool {
    if let Some(args) = generic_args(ty, "Box") {
        return match args.first() {
            Some(Type::TraitObject(object)) => object.bounds.iter().any(|bound| match bound {
                syn::TypeParamBound::Trait(t) => t
                    .path
                    .segments
                    .last()
                    .is_some_and(|s| s.ident.to_string().contains("Error")),
                _ => false,
            }),
            Some(inner) => is_error_like(inner),
            None => false,
        };
    }

    last_segment_ident(ty).is_some_and(|name| name.ends_with("Error"))
}

/// `self`, `&self` and `&mut self`, written short or as `self: &Self`
fn is_plain_receiver(receiver: &syn::Receiver) -> bool {
    let ty = match receiver.ty.as_ref() {
        Type::Reference(reference) => reference.elem.as_ref(),
        other => other,
    };
    matches!(ty, Type::Path(p) if p.qself.is_none() && p.path.is_ident("Self"))
}

fn context_passing(ty: &Type) -> Option<ContextPassing> {
    match ty {
        Type::Reference(reference) if reference.mutability.is_none() => {
            is_context(&reference.elem).then_some(ContextPassing::ByReference)
        }
        Type::Reference(_) => None,
        other => is_context(other).then_some(ContextPassing::ByValue),
    }
}

fn is_context(ty: &Type) -> bool {
    match TypeExpression::from_type(ty) {
        Some(expr) => {
            let written = expr.to_string();
            CONTEXT_PATHS.contains(&written.trim_start_matches("::"))
        }
        None => false,
    }
}

/// Generic type arguments of `ty` when its last path segment is `name`
fn generic_args<'t>(ty: &'t Type, name: &str) -> Option<Vec<&'t Type>> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != name {
        return None;
    }

    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return Some(Vec::new());
    };

    Some(
        args.args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
    )
}

fn last_segment_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    last_segment_ident(ty).as_deref() == Some(name)
}

fn type_text(ty: &Type) -> String {
    ty.to_token_stream().to_string()
}
