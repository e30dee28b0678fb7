//! lambdagen - AWS Lambda entry points from annotated Rust services.
//!
//! Services are plain Rust types marked up in their doc comments. The generator reads the
//! annotations, checks the declarations against the shapes it can call, and writes one
//! `lambda_http` program plus a JSON route descriptor per handler.
//!
//! ```text
//! /// lambdagen:service base_path=/hr
//! pub struct Employees { .. }
//!
//! /// lambdagen:service_init
//! pub fn new_employees() -> Result<Employees, StoreError> { .. }
//!
//! pub struct GetEmployee {
//!     /// lambdagen:"pathvar,id"
//!     pub id: u64,
//! }
//!
//! impl Employees {
//!     /// lambdagen:handler GET /employees/{id}
//!     pub async fn get(&self, ctx: &Context, req: GetEmployee) -> Result<Employee, StoreError> { .. }
//! }
//! ```
//!
//! # Architecture
//!
//! 1. [`scanner`] - Collects the `.rs` files of a module
//! 2. [`parser`] - Parses them and assigns each its Rust module path
//! 3. [`type_resolver`] - Indexes items and resolves type names
//! 4. [`annotation`] - Finds role tokens in doc text
//! 5. [`builder`] - Validates declarations and builds the [`model`]
//! 6. [`output`] - Enforces unique routes and output locations, then writes units
//! 7. [`codegen`] and [`metadata`] - Render the entry point and route descriptor
//!
//! Generated programs depend on [`runtime`] for coercion and error bodies.
//!
//! # Example Usage
//!
//! ```no_run
//! use lambdagen::{cli::run_with_config, config::GeneratorConfig};
//!
//! let config = GeneratorConfig::new("./hr-service", "hr_service");
//! let summary = run_with_config(&config, &["src/employees".to_string()]).unwrap();
//! println!("Wrote {} units", summary.units_written);
//! ```

pub mod annotation;
pub mod builder;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod metadata;
pub mod model;
pub mod output;
pub mod parser;
pub mod runtime;
pub mod scanner;
pub mod type_resolver;
