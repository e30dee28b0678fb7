//! Employee directory service.

use lambda_http::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewEmployee {
    pub name: String,
}

#[derive(Debug)]
pub struct StoreError(String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

/// Employee directory backed by an in-memory map.
///
/// lambdagen:service
pub struct Employees {
    store: HashMap<u64, Employee>,
}

/// Loads the directory.
///
/// lambdagen:service_init
pub fn new_employees() -> Result<Employees, StoreError> {
    Ok(Employees {
        store: HashMap::new(),
    })
}

pub type EmployeeId = u64;

pub struct GetEmployee {
    /// lambdagen:"pathvar,id"
    pub employee_id: EmployeeId,
    /// lambdagen:"queryvar"
    pub include_inactive: bool,
}

#[derive(Default)]
pub struct ListEmployees {
    /// lambdagen:"queryvar,limit"
    pub max_results: u32,
    pub cursor: Option<String>,
}

pub struct CreateEmployee {
    /// lambdagen:"body"
    pub employee: NewEmployee,
}

impl Employees {
    /// lambdagen:handler GET /employees/{id}
    pub async fn get(&self, _ctx: &Context, req: GetEmployee) -> Result<Employee, StoreError> {
        self.store
            .get(&req.employee_id)
            .filter(|e| e.active || req.include_inactive)
            .cloned()
            .ok_or_else(|| StoreError(format!("employee {} not found", req.employee_id)))
    }

    /// lambdagen:handler GET /employees
    pub fn list(&self, _ctx: &Context, req: ListEmployees) -> Vec<Employee> {
        self.store.values().take(req.max_results as usize).cloned().collect()
    }

    /// lambdagen:handler :: POST /employees
    pub async fn create(&mut self, _ctx: Context, req: CreateEmployee) -> Result<Employee, StoreError> {
        let id = self.store.len() as u64 + 1;
        let employee = Employee {
            id,
            name: req.employee.name,
            active: true,
        };
        self.store.insert(id, employee.clone());
        Ok(employee)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }
}
