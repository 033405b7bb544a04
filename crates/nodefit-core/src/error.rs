// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for nodefit operations
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// A resource quantity could not be parsed
    #[error("Invalid {resource} quantity '{value}': {reason}")]
    #[diagnostic(
        code(nodefit::invalid_quantity),
        help("CPU quantities must be millicores with an 'm' suffix (e.g. '500m') or a non-negative decimal number of cores (e.g. '2', '0.5')")
    )]
    InvalidQuantity {
        #[allow(unused)]
        resource: String,
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },

    /// A required field is absent from a resource
    #[error("Missing required field {field} on {kind}")]
    #[diagnostic(
        code(nodefit::missing_field),
        help("The control plane returned an incomplete object; check the API server version")
    )]
    MissingField {
        #[allow(unused)]
        kind: String,
        #[allow(unused)]
        field: String,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(
        resource: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidQuantity {
            resource: resource.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            kind: kind.into(),
            field: field.into(),
        }
    }
}
