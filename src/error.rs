//! Error types for the drift detection pipeline.
//!
//! Every failure is classified into one of a small set of kinds: the target
//! does not exist, the cluster or store could not be queried, or a fetched
//! document could not be decoded. Errors are wrapped with the operation being
//! performed as they travel up to the detector.

use thiserror::Error;

/// The main error type for drift detection.
#[derive(Debug, Error)]
pub enum DriftError {
    /// A release, declared resource or storage namespace does not exist.
    #[error("{resource} {} not found", qualified(.namespace.as_deref(), .name))]
    NotFound {
        /// Type of the missing resource.
        resource: String,
        /// Name of the missing resource.
        name: String,
        /// Namespace searched, if any.
        namespace: Option<String>,
    },

    /// The cluster or release store could not be queried.
    #[error("failed to {operation}: {message}")]
    Access {
        /// Operation that was attempted.
        operation: String,
        /// Underlying failure.
        message: String,
    },

    /// A stored or fetched document is malformed.
    #[error("failed to decode {what}: {message}")]
    Decode {
        /// Document being decoded.
        what: String,
        /// Description of the problem.
        message: String,
    },

    /// Settings could not be loaded or are invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error annotated with the operation during which it occurred.
    #[error("failed to {operation}: {source}")]
    Context {
        /// Operation and identifiers being processed.
        operation: String,
        /// The wrapped error.
        #[source]
        source: Box<DriftError>,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read or parsed.
    #[error("Failed to parse settings: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A setting has an invalid value.
    #[error("Invalid setting {field}: {message}")]
    ValidationError {
        /// Description of the problem.
        message: String,
        /// Setting that failed validation.
        field: String,
    },

    /// The requested Helm storage driver is not readable by this tool.
    #[error("Unsupported storage driver: {driver}")]
    UnsupportedDriver {
        /// Driver name as given.
        driver: String,
    },
}

/// Classification of a [`DriftError`], ignoring context layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Target does not exist.
    NotFound,
    /// Cluster or store query failed.
    Access,
    /// Malformed document.
    Decode,
    /// Invalid settings.
    Config,
    /// Local IO failure.
    Io,
}

/// Result type alias for drift detection operations.
pub type Result<T> = std::result::Result<T, DriftError>;

fn qualified(namespace: Option<&str>, name: &str) -> String {
    namespace.map_or_else(|| name.to_string(), |ns| format!("{ns}/{name}"))
}

impl DriftError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(
        resource: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
            namespace: namespace.map(String::from),
        }
    }

    /// Creates an access error.
    #[must_use]
    pub fn access(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Wraps this error with the operation that was in progress.
    #[must_use]
    pub fn context(self, operation: impl Into<String>) -> Self {
        Self::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Returns the kind of the innermost error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Access { .. } => ErrorKind::Access,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Maps a Kubernetes client error, treating 404 as not-found.
    #[must_use]
    pub fn from_kube(
        err: kube::Error,
        operation: impl Into<String>,
        missing: impl FnOnce() -> Self,
    ) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => missing(),
            other => Self::access(operation, other.to_string()),
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific setting.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: field.into(),
        }
    }
}

/// Extension for annotating results with the operation in progress.
pub trait ResultExt<T> {
    /// Wraps the error, if any, with `operation`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error when `self` is an error.
    fn context(self, operation: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`] but builds the message lazily.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error when `self` is an error.
    fn with_context<F: FnOnce() -> String>(self, operation: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(operation))
    }

    fn with_context<F: FnOnce() -> String>(self, operation: F) -> Result<T> {
        self.map_err(|e| e.context(operation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_target() {
        let err = DriftError::not_found("Helm release", "x", None);
        assert_eq!(err.to_string(), "Helm release x not found");

        let err = DriftError::not_found("HelmRelease", "app", Some("flux-system"));
        assert_eq!(err.to_string(), "HelmRelease flux-system/app not found");
    }

    #[test]
    fn test_context_preserves_kind() {
        let err = DriftError::decode("release record", "bad gzip header")
            .context("get Helm release app")
            .context("detect drift");

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(
            err.to_string(),
            "failed to detect drift: failed to get Helm release app: failed to decode release record: bad gzip header"
        );
    }

    #[test]
    fn test_result_ext_wraps_errors_only() {
        let ok: Result<u32> = Ok(3);
        assert_eq!(ok.context("anything").unwrap(), 3);

        let err: Result<u32> = Err(DriftError::access("list namespaces", "forbidden"));
        let wrapped = err.with_context(|| String::from("locate release")).unwrap_err();
        assert_eq!(wrapped.kind(), ErrorKind::Access);
        assert!(wrapped.to_string().starts_with("failed to locate release"));
    }
}
