use std::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The native provider reported a failure.
    Provider,
    /// The native provider stopped answering before completing a request.
    Disconnected,
    /// A payload could not be encoded or decoded.
    Payload,
    /// The resource is not present in the registry.
    UnknownResource,
    /// The polling synchronizer could not be started.
    Synchronizer,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Provider => "Provider",
            Self::Disconnected => "Disconnected",
            Self::Payload => "Payload",
            Self::UnknownResource => "Unknown Resource",
            Self::Synchronizer => "Synchronizer",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A controller error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Creates an [`ErrorKind::Provider`] error.
    ///
    /// Native providers use it to report their failures.
    #[must_use]
    #[inline]
    pub fn provider(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Provider, description)
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Payload, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn error_display() {
        let error = Error::provider("backend not available");

        assert_eq!(error.kind(), ErrorKind::Provider);
        assert_eq!(error.description(), "backend not available");
        assert_eq!(error.to_string(), "Provider: backend not available");
    }

    #[test]
    fn payload_error() {
        let error: Error = serde_json::from_str::<u8>("\"OK\"").unwrap_err().into();

        assert_eq!(error.kind(), ErrorKind::Payload);
    }
}
