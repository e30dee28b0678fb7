//! Registration and rendering of generated units.
//!
//! The coordinator owns two tables for the duration of a run: output locations and routes.
//! Modules register their services as a batch; a conflict anywhere in the batch rejects all of
//! it. Rendering then writes every registered unit in registration order.

use crate::codegen::CodeSynthesizer;
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::metadata::{self, RouteDescriptor};
use crate::model::{HandlerDefinition, HttpMethod, ServiceDefinition};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::process::Command;

/// File name of the generated entry point inside a unit directory
pub const ENTRY_POINT_FILE: &str = "main.rs";

/// One handler waiting to be rendered.
#[derive(Debug)]
struct OutputUnit {
    key: String,
    service: usize,
    handler: usize,
}

/// Per-run registry of output locations and routes.
#[derive(Debug, Default)]
pub struct OutputCoordinator {
    services: Vec<ServiceDefinition>,
    units: Vec<OutputUnit>,
    locations: HashSet<String>,
    routes: HashMap<String, BTreeSet<HttpMethod>>,
}

/// Deterministic output location of a handler
pub fn output_key(service: &ServiceDefinition, handler: &HandlerDefinition) -> String {
    format!("{}_{}", service.name(), handler.function)
}

impl OutputCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Registered output keys in rendering order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|unit| unit.key.as_str())
    }

    /// Registers every handler of a module's services.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateOutput`] or [`Error::DuplicateRoute`] on the first conflict,
    /// with or without earlier registrations. Nothing from the batch is kept in that case.
    pub fn register_module(&mut self, services: Vec<ServiceDefinition>) -> Result<usize> {
        let mut staged_locations = HashSet::new();
        let mut staged_routes: HashSet<(String, HttpMethod)> = HashSet::new();

        for service in &services {
            for handler in &service.handlers {
                let key = output_key(service, handler);
                if self.locations.contains(&key) || !staged_locations.insert(key.clone()) {
                    return Err(Error::DuplicateOutput { location: key });
                }

                let route = service.effective_path(handler);
                let taken = self
                    .routes
                    .get(&route)
                    .is_some_and(|methods| methods.contains(&handler.method));
                if taken || !staged_routes.insert((route.clone(), handler.method)) {
                    return Err(Error::DuplicateRoute {
                        method: handler.method.to_string(),
                        path: route,
                    });
                }
            }
        }

        let mut registered = 0;
        for service in services {
            let service_idx = self.services.len();
            for (handler_idx, handler) in service.handlers.iter().enumerate() {
                let key = output_key(&service, handler);
                debug!("Registered {} for {} {}", key, handler.method, service.effective_path(handler));

                self.locations.insert(key.clone());
                self.routes
                    .entry(service.effective_path(handler))
                    .or_default()
                    .insert(handler.method);
                self.units.push(OutputUnit {
                    key,
                    service: service_idx,
                    handler: handler_idx,
                });
                registered += 1;
            }
            self.services.push(service);
        }

        Ok(registered)
    }

    /// Writes the entry point and route descriptor of every registered handler.
    ///
    /// Stops at the first failure. Units written before the failure are left on disk.
    pub fn render(&self, config: &GeneratorConfig) -> Result<usize> {
        let synthesizer = CodeSynthesizer::new(config.failure_policy);
        let output_root = config.output_root();
        info!("Rendering {} unit(s) into {}", self.units.len(), output_root.display());

        for unit in &self.units {
            let service = &self.services[unit.service];
            let handler = &service.handlers[unit.handler];
            let dir = output_root.join(&unit.key);

            let code = synthesizer.render(service, handler)?;
            let entry_point = dir.join(ENTRY_POINT_FILE);
            metadata::write_to_file(&code, &entry_point)?;

            if config.format {
                if let Err(e) = format_entry_point(&entry_point) {
                    warn!("Could not format {}: {}", entry_point.display(), e);
                }
            }

            metadata::write_descriptor(&dir, &RouteDescriptor::new(service, handler))?;
            debug!("Wrote {}", dir.display());
        }

        Ok(self.units.len())
    }
}

/// Runs `rustfmt` over a generated file; the binary can be overridden with `LAMBDAGEN_RUSTFMT`.
fn format_entry_point(path: &Path) -> anyhow::Result<()> {
    let rustfmt = std::env::var("LAMBDAGEN_RUSTFMT").unwrap_or_else(|_| "rustfmt".to_string());

    let status = Command::new(rustfmt)
        .arg("--edition")
        .arg("2021")
        .arg(path)
        .status()?;
    if !status.success() {
        anyhow::bail!("rustfmt exited with {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ContextPassing, HandlerSignature, InitializerDefinition, QualifiedName, ReturnShape, BASE_PATH_KEY,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn handler(function: &str, method: HttpMethod, path: &str) -> HandlerDefinition {
        HandlerDefinition {
            service: String::new(),
            method,
            path: path.to_string(),
            request_config: None,
            function: function.to_string(),
            signature: HandlerSignature {
                is_async: false,
                context: ContextPassing::ByReference,
                returns: ReturnShape::Plain,
            },
        }
    }

    fn service(name: &str, base_path: Option<&str>, handlers: Vec<HandlerDefinition>) -> ServiceDefinition {
        let mut config = BTreeMap::new();
        if let Some(base) = base_path {
            config.insert(BASE_PATH_KEY.to_string(), base.to_string());
        }
        let handlers = handlers
            .into_iter()
            .map(|mut h| {
                h.service = name.to_string();
                h
            })
            .collect();

        ServiceDefinition {
            type_ref: QualifiedName::new("hr", name),
            config,
            initializer: InitializerDefinition {
                function: QualifiedName::new("hr", "new"),
                associated: true,
                is_async: false,
            },
            handlers,
        }
    }

    #[test]
    fn test_same_path_different_method_is_allowed() {
        let mut coordinator = OutputCoordinator::new();
        let registered = coordinator
            .register_module(vec![service(
                "Employees",
                None,
                vec![
                    handler("get", HttpMethod::Get, "/employees/{id}"),
                    handler("delete", HttpMethod::Delete, "/employees/{id}"),
                ],
            )])
            .unwrap();

        assert_eq!(registered, 2);
        assert_eq!(coordinator.keys().collect::<Vec<_>>(), vec!["Employees_get", "Employees_delete"]);
    }

    #[test]
    fn test_routes_compare_in_clean_form() {
        let mut coordinator = OutputCoordinator::new();
        coordinator
            .register_module(vec![service(
                "Employees",
                None,
                vec![handler("list", HttpMethod::Get, "/employees")],
            )])
            .unwrap();

        let err = coordinator
            .register_module(vec![service(
                "Staff",
                Some("/"),
                vec![handler("list", HttpMethod::Get, "//employees/")],
            )])
            .unwrap_err();

        assert_eq!(err.to_string(), "route GET /employees is already mapped");
    }

    #[test]
    fn test_duplicate_route_rejects_batch() {
        let mut coordinator = OutputCoordinator::new();
        coordinator
            .register_module(vec![service(
                "Employees",
                Some("/hr"),
                vec![handler("get", HttpMethod::Get, "/employees/{id}")],
            )])
            .unwrap();

        let err = coordinator
            .register_module(vec![service(
                "Staff",
                None,
                vec![
                    handler("list", HttpMethod::Get, "/staff"),
                    handler("get", HttpMethod::Get, "/hr/employees/{id}"),
                ],
            )])
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateRoute { .. }));
        assert_eq!(err.to_string(), "route GET /hr/employees/{id} is already mapped");
        // the rejected batch left nothing behind
        assert_eq!(coordinator.len(), 1);
        coordinator
            .register_module(vec![service("Staff", None, vec![handler("list", HttpMethod::Get, "/staff")])])
            .unwrap();
        assert_eq!(coordinator.len(), 2);
    }

    #[test]
    fn test_duplicate_route_within_batch() {
        let mut coordinator = OutputCoordinator::new();
        let err = coordinator
            .register_module(vec![service(
                "Employees",
                None,
                vec![
                    handler("get", HttpMethod::Get, "/employees"),
                    handler("list", HttpMethod::Get, "/employees"),
                ],
            )])
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateRoute { .. }));
        assert!(coordinator.is_empty());
    }

    #[test]
    fn test_duplicate_output_location() {
        let mut coordinator = OutputCoordinator::new();
        coordinator
            .register_module(vec![service("Employees", None, vec![handler("get", HttpMethod::Get, "/a")])])
            .unwrap();

        let err = coordinator
            .register_module(vec![service("Employees", None, vec![handler("get", HttpMethod::Get, "/b")])])
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateOutput { .. }));
    }

    #[test]
    fn test_render_writes_units() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = GeneratorConfig::new(temp_dir.path(), "hr");
        config.format = false;

        let mut coordinator = OutputCoordinator::new();
        coordinator
            .register_module(vec![service(
                "Employees",
                Some("/hr"),
                vec![
                    handler("get", HttpMethod::Get, "/employees/{id}"),
                    handler("create", HttpMethod::Post, "/employees"),
                ],
            )])
            .unwrap();

        assert_eq!(coordinator.render(&config).unwrap(), 2);

        let unit = temp_dir.path().join("lambda").join("Employees_get");
        let code = fs::read_to_string(unit.join(ENTRY_POINT_FILE)).unwrap();
        let compact: String = code.split_whitespace().collect();
        assert!(compact.contains("hr::Employees::new()"));

        let descriptor = fs::read_to_string(unit.join(metadata::DESCRIPTOR_FILE)).unwrap();
        assert_eq!(descriptor, "{\"method\":\"GET\",\"path\":\"/hr/employees/{id}\"}\n");

        assert!(temp_dir.path().join("lambda/Employees_create/spec.json").exists());
    }

    #[test]
    fn test_render_stops_on_io_failure() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("lambda"), "a file, not a directory").unwrap();
        let mut config = GeneratorConfig::new(temp_dir.path(), "hr");
        config.format = false;

        let mut coordinator = OutputCoordinator::new();
        coordinator
            .register_module(vec![service("Employees", None, vec![handler("get", HttpMethod::Get, "/a")])])
            .unwrap();

        let err = coordinator.render(&config).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
