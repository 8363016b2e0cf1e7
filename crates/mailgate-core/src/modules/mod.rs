//! Program modules, the handler registry, and tombstones for retired
//! handlers.

mod model;
mod registry;
mod repository;

pub use model::{ModuleProperties, Program, ProgramModule};
pub use registry::{
    ADMIN_MORPH_HANDLER, ADMIN_MORPH_MIGRATION, HandlerEntry, HandlerRegistry, HandlerStatus,
    admin_morph_properties,
};
pub use repository::ModuleRepository;
