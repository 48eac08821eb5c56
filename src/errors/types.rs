//! # Error Types
//!
//! Error types for the secrets engine using `thiserror`.

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the Apigee secrets engine
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A write was missing a required field or carried a malformed one.
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Upstream connection settings are absent or incomplete.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The upstream client could not be constructed for a reason other than configuration.
    #[error("Client unavailable: {message}")]
    ClientUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The credential API rejected a create or delete call.
    #[error("Upstream error during {operation} for {target}: {message}")]
    Upstream { operation: String, target: String, message: String, status: Option<u16> },

    /// Revoking an issued credential failed.
    #[error("Revocation failed for key '{key}': {source}")]
    Revocation {
        key: String,
        #[source]
        source: Box<EngineError>,
    },

    /// The storage collaborator failed.
    #[error("Storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A resource required by the caller does not exist.
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// The caller's deadline passed before the operation finished.
    #[error("Operation timed out: {operation}")]
    DeadlineExceeded { operation: String },

    /// No handler exists for this operation on this path.
    #[error("Unsupported operation '{operation}' on path '{path}'")]
    UnsupportedOperation { operation: String, path: String },
}

impl EngineError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a client unavailable error
    pub fn client_unavailable<S: Into<String>>(message: S) -> Self {
        Self::ClientUnavailable { message: message.into(), source: None }
    }

    /// Create a client unavailable error with source
    pub fn client_unavailable_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::ClientUnavailable { message: message.into(), source: Some(source) }
    }

    /// Create an upstream error
    pub fn upstream<O, T, M>(operation: O, target: T, message: M, status: Option<u16>) -> Self
    where
        O: Into<String>,
        T: Into<String>,
        M: Into<String>,
    {
        Self::Upstream {
            operation: operation.into(),
            target: target.into(),
            message: message.into(),
            status,
        }
    }

    /// Wrap a failure that happened while revoking `key`
    pub fn revocation<K: Into<String>>(key: K, source: EngineError) -> Self {
        Self::Revocation { key: key.into(), source: Box::new(source) }
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(context: S) -> Self {
        Self::Storage { context: context.into(), source: None }
    }

    /// Create a storage error with source
    pub fn storage_with_source<S, E>(context: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage { context: context.into(), source: Some(Box::new(source)) }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled { operation: operation.into() }
    }

    /// Create a deadline exceeded error
    pub fn deadline_exceeded<S: Into<String>>(operation: S) -> Self {
        Self::DeadlineExceeded { operation: operation.into() }
    }

    /// Create an unsupported operation error
    pub fn unsupported<O: Into<String>, P: Into<String>>(operation: O, path: P) -> Self {
        Self::UnsupportedOperation { operation: operation.into(), path: path.into() }
    }

    /// HTTP status reported by the upstream API, looking through revocation wrappers.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Revocation { source, .. } => source.upstream_status(),
            _ => None,
        }
    }

    /// Field named by a validation error, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Whether the error was caused by the caller's input rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::UnsupportedOperation { .. }
        )
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match first_field_error(&errors) {
            Some((field, message)) => Self::validation_field(message, field),
            None => Self::validation(errors.to_string()),
        }
    }
}

/// First failing leaf field in name order, descending into nested structs.
fn first_field_error(errors: &validator::ValidationErrors) -> Option<(String, String)> {
    use validator::ValidationErrorsKind;

    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries.into_iter().find_map(|(field, kind)| match kind {
        ValidationErrorsKind::Field(errs) => errs.first().map(|e| {
            let message = e
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid value for {}", field));
            (field.to_string(), message)
        }),
        ValidationErrorsKind::Struct(nested) => first_field_error(nested),
        ValidationErrorsKind::List(items) => items.values().find_map(|n| first_field_error(n)),
    })
}
