//! Program module models.

use serde::{Deserialize, Serialize};

/// Display and ordering properties of a module handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProperties {
    /// Title shown in program navigation.
    pub link_title: String,
    /// Title shown on the admin side.
    pub admin_title: String,
    /// Module category, e.g. `manage` or `learn`.
    pub module_type: String,
    /// Sort position within the category.
    pub seq: i64,
    /// Whether programs may enable the module.
    pub choosable: bool,
}

/// A registered module row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramModule {
    /// Row identifier.
    pub id: i64,
    /// Handler name the module dispatches to.
    pub handler: String,
    /// Stored properties.
    pub properties: ModuleProperties,
}

/// A program that modules can be enabled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Row identifier.
    pub id: i64,
    /// Program name.
    pub name: String,
}
