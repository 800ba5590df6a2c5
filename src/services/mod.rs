//! Service layer: task registry and provisioning services.

pub mod package;
pub mod registry;
pub mod repository;

pub use package::{is_builtin_analyzer, PackageService, BUILTIN_ANALYZERS};
pub use registry::{RegisterOutcome, TaskRegistry};
pub use repository::RepositoryService;
