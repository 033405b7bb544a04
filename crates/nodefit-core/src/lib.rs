//! Nodefit Core - Fundamental types shared by the nodefit scheduler crates
//!
//! This crate provides:
//! - Kubernetes resource re-exports (k8s-openapi)
//! - CPU quantity parsing normalized to millicores
//! - Pod and node accessors used by the scheduling pipeline
//! - Watch event wire types
//! - Error types with miette diagnostics

pub mod error;
pub mod events;
pub mod resources;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use events::{WatchEvent, WatchEventType};
pub use resources::{
    assigned_node, is_claimed_by, is_unscheduled, ResourceMeta, ResourceQuantities,
    SCHEDULER_NAME_ANNOTATION,
};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
