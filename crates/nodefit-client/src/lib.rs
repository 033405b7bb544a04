// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod api_client;
pub mod error;
pub mod kubeconfig;
pub mod mock;
pub mod traits;

// Re-export primary types
pub use api_client::{ApiClient, ClientConfig};
pub use error::{ClientError, Result};
pub use kubeconfig::Kubeconfig;
pub use mock::{MockCall, MockControlPlane, MockWatchItem, MockWatchSession};
pub use traits::{ControlPlane, PodWatchStream};
