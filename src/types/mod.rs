//! Type definitions

pub mod import_job;
pub mod messages;
pub mod stock;

pub use import_job::*;
pub use messages::*;
pub use stock::*;
