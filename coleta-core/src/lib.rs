//! Core types and coordination for the coleta collection-point finder.

/// Filtered discovery state machine.
pub mod coordinator;
/// Domain models and identifiers shared by all providers.
pub mod model;
/// Registry for plugging catalog backends into the service.
pub mod plugin;
/// Traits describing the backend interfaces.
pub mod ports;
/// Toggle-set of selected material categories.
pub mod selection;
/// High-level service facade used by clients.
pub mod service;

pub use coordinator::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use selection::*;
pub use service::*;
