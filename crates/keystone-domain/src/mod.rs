//! # Keystone Domain
//!
//! Core types shared by the registry, its adapters and applications:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`key`] | [`TypeKey`] resource kind identifier |
//! | [`ports`] | Factory, liveness and shutdown contracts |
//! | [`value_objects`] | Parsed system configuration |
//! | [`error`] | Error taxonomy and `Result` alias |

pub mod constants;
pub mod error;
pub mod key;
pub mod ports;
pub mod value_objects;

pub use error::{Error, FactoryErrorKind, Result};
pub use key::{Instance, TypeKey};
pub use ports::{
    LivenessProbe, ManagedResource, ResourceFactory, ResourceLiveness, Resolve,
    OwnerCheck, ShutdownAction, ShutdownCoordinator,
};
pub use value_objects::SystemConfig;
