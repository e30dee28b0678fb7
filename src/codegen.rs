//! Entry-point synthesis.
//!
//! Each handler becomes a standalone `main.rs` for `lambda_http`. The program builds the
//! service, pulls path and query variables out of the request, coerces them, decodes the body,
//! calls the handler and turns the outcome into a JSON response.

use crate::error::{Error, Result};
use crate::model::{
    ContextPassing, HandlerDefinition, ReturnShape, ScalarType, ServiceDefinition, VariableDefinition,
    VariableType,
};
use clap::ValueEnum;
use log::debug;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// First line of every generated file
pub const GENERATED_HEADER: &str = "// Code generated by lambdagen. DO NOT EDIT.";

/// What generated code does when a path or query value cannot be coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Answer with a 400 and an error body
    #[default]
    Respond,
    /// Panic, ending the invocation
    Abort,
}

/// Renders one entry point per handler.
#[derive(Debug, Clone, Default)]
pub struct CodeSynthesizer {
    policy: FailurePolicy,
}

impl CodeSynthesizer {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    /// Renders the entry point of `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] when a name cannot be expressed as a Rust path or the result
    /// does not parse as a Rust file.
    pub fn render(&self, service: &ServiceDefinition, handler: &HandlerDefinition) -> Result<String> {
        let unit = format!("{}_{}", service.name(), handler.function);
        debug!("Rendering entry point {}", unit);

        let tokens = self.program(&unit, service, handler)?;

        let file = syn::parse2::<syn::File>(tokens).map_err(|e| Error::Render {
            unit: unit.clone(),
            message: format!("generated code does not parse: {}", e),
        })?;

        Ok(format!("{}\n\n{}\n", GENERATED_HEADER, quote!(#file)))
    }

    fn program(&self, unit: &str, service: &ServiceDefinition, handler: &HandlerDefinition) -> Result<TokenStream> {
        let init_path = parse_path(unit, &service.initializer.call_path(&service.type_ref))?;
        let init_await = service.initializer.is_async.then(|| quote!(.await));

        let mut extraction = Vec::new();
        let mut assignments = Vec::new();
        let mut uses_path = false;
        let mut uses_query = false;
        let mut config_literal = None;

        if let Some(config) = &handler.request_config {
            let mut next_var = 0usize;

            for variable in &config.path_variables {
                uses_path = true;
                let var = format_ident!("arg_{}", next_var);
                next_var += 1;
                extraction.push(self.coerce(unit, &var, quote!(path_parameters), "path", variable)?);
                assignments.push((parse_ident(unit, &variable.field_name)?, var));
            }

            for variable in &config.query_variables {
                uses_query = true;
                let var = format_ident!("arg_{}", next_var);
                next_var += 1;
                extraction.push(self.coerce(unit, &var, quote!(query_parameters), "query", variable)?);
                assignments.push((parse_ident(unit, &variable.field_name)?, var));
            }

            if let Some(body) = &config.request_body {
                let var = format_ident!("arg_{}", next_var);
                extraction.push(decode_body(unit, &var, body)?);
                assignments.push((parse_ident(unit, &body.field_name)?, var));
            }

            let config_path = parse_path(unit, &config.type_ref.path())?;
            let fields = assignments.iter().map(|(field, _)| field);
            let vars = assignments.iter().map(|(_, var)| var);
            let rest = config.has_unannotated_fields.then(|| quote!(..Default::default()));
            config_literal = Some(quote! {
                let config = #config_path { #(#fields: #vars,)* #rest };
            });
        }

        let path_map = uses_path.then(|| quote!(let path_parameters = request.path_parameters();));
        let query_map = uses_query.then(|| quote!(let query_parameters = request.query_string_parameters();));

        let method = parse_ident(unit, &handler.function)?;
        let context_arg = match handler.signature.context {
            ContextPassing::ByValue => quote!(context),
            ContextPassing::ByReference => quote!(&context),
        };
        let config_arg = config_literal.as_ref().map(|_| quote!(, config));
        let handler_await = handler.signature.is_async.then(|| quote!(.await));
        let call = quote!(service.#method(#context_arg #config_arg) #handler_await);

        let respond = match handler.signature.returns {
            ReturnShape::Result => quote! {
                match #call {
                    Ok(output) => respond_output(&output),
                    Err(err) => respond_error(500, ApiError::new("handler failed", err)),
                }
            },
            ReturnShape::Plain => quote! {
                let output = #call;
                respond_output(&output)
            },
        };

        Ok(quote! {
            use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
            use lambdagen::runtime::{self, ApiError};

            async fn handle(request: Request) -> Result<Response<Body>, Error> {
                #[allow(unused_mut)]
                let mut service = match #init_path() #init_await {
                    Ok(service) => service,
                    Err(err) => return respond_error(500, ApiError::new("failed to initialize service", err)),
                };

                let context = request.lambda_context();
                #path_map
                #query_map
                #(#extraction)*
                #config_literal

                #respond
            }

            fn respond_output<T: runtime::Serialize>(output: &T) -> Result<Response<Body>, Error> {
                match runtime::to_json(output) {
                    Ok(body) => respond_json(200, body),
                    Err(err) => respond_error(500, ApiError::new("failed to encode response", err)),
                }
            }

            fn respond_error(status: u16, error: ApiError) -> Result<Response<Body>, Error> {
                respond_json(status, runtime::to_json(&error)?)
            }

            fn respond_json(status: u16, body: String) -> Result<Response<Body>, Error> {
                Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body))?)
            }

            #[tokio::main]
            async fn main() -> Result<(), Error> {
                run(service_fn(handle)).await
            }
        })
    }

    /// Extraction and coercion of one path or query variable
    fn coerce(
        &self,
        unit: &str,
        var: &syn::Ident,
        map: TokenStream,
        location: &str,
        variable: &VariableDefinition,
    ) -> Result<TokenStream> {
        let VariableType::Scalar(scalar) = &variable.ty else {
            return Err(Error::Render {
                unit: unit.to_string(),
                message: format!("{} variable `{}` is not a scalar", location, variable.external_name),
            });
        };

        let name = &variable.external_name;
        let message = format!("invalid {} parameter `{}`", location, name);
        let conversion = match scalar {
            ScalarType::String => quote!(runtime::coerce_string),
            ScalarType::Boolean => quote!(runtime::coerce_bool),
            ScalarType::Integer(kind) => {
                let ty = format_ident!("{}", kind.as_str());
                quote!(runtime::coerce_integer::<#ty>)
            }
        };
        let converted = quote!(#conversion(#map.first(#name).unwrap_or_default()));

        Ok(match self.policy {
            FailurePolicy::Respond => quote! {
                let #var = match #converted {
                    Ok(value) => value,
                    Err(err) => return respond_error(400, ApiError::new(#message, err)),
                };
            },
            FailurePolicy::Abort => quote! {
                let #var = #converted.unwrap_or_else(|err| panic!("{}", ApiError::new(#message, err)));
            },
        })
    }
}

fn decode_body(unit: &str, var: &syn::Ident, body: &VariableDefinition) -> Result<TokenStream> {
    let VariableType::Struct(type_ref) = &body.ty else {
        return Err(Error::Render {
            unit: unit.to_string(),
            message: format!("body `{}` is not a struct", body.field_name),
        });
    };
    let body_type = parse_path(unit, &type_ref.path())?;

    Ok(quote! {
        let #var: #body_type = match runtime::from_json(request.body().as_ref()) {
            Ok(value) => value,
            Err(err) => return respond_error(400, ApiError::new("invalid request body", err)),
        };
    })
}

fn parse_path(unit: &str, path: &str) -> Result<syn::Path> {
    syn::parse_str(path).map_err(|e| Error::Render {
        unit: unit.to_string(),
        message: format!("`{}` is not a valid path: {}", path, e),
    })
}

fn parse_ident(unit: &str, name: &str) -> Result<syn::Ident> {
    syn::parse_str(name).map_err(|e| Error::Render {
        unit: unit.to_string(),
        message: format!("`{}` is not a valid identifier: {}", name, e),
    })
}
