//! Error taxonomy of the telemetry and control core.

use crate::hypervisor::HypervisorError;

/// Errors raised by the core. None of them is fatal to the process: each is
/// confined to the domain or operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Domain could not be resolved by name (stale or renamed selection).
    DomainLookupFailed {
        name: String,
        source: HypervisorError,
    },
    /// A required counter is missing (e.g. a memory stat tag).
    MetricUnavailable(String),
    /// A lifecycle or device call returned an error.
    HypervisorOperationFailed(HypervisorError),
    /// User-supplied text cannot be embedded in a device descriptor.
    MalformedInput(String),
}

impl Error {
    /// Status-line rendering of the error.
    ///
    /// Structured hypervisor errors surface their numeric code and message;
    /// everything else falls back to the plain error text.
    pub fn humanize(&self) -> String {
        match self {
            Error::HypervisorOperationFailed(HypervisorError::Api { code, message })
            | Error::DomainLookupFailed {
                source: HypervisorError::Api { code, message },
                ..
            } => format!("Libvirt err {}: {}", code, message),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DomainLookupFailed { name, source } => {
                write!(f, "domain '{}' not found: {}", name, source)
            }
            Error::MetricUnavailable(what) => write!(f, "metric unavailable: {}", what),
            Error::HypervisorOperationFailed(e) => write!(f, "{}", e),
            Error::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DomainLookupFailed { source, .. } => Some(source),
            Error::HypervisorOperationFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HypervisorError> for Error {
    fn from(e: HypervisorError) -> Self {
        Error::HypervisorOperationFailed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_surfaces_api_code_and_message() {
        let err = Error::HypervisorOperationFailed(HypervisorError::Api {
            code: 55,
            message: "Requested operation is not valid: domain is not running".into(),
        });
        assert_eq!(
            err.humanize(),
            "Libvirt err 55: Requested operation is not valid: domain is not running"
        );
    }

    #[test]
    fn humanize_falls_back_to_raw_text() {
        let err = Error::HypervisorOperationFailed(HypervisorError::Other("broken pipe".into()));
        assert_eq!(err.humanize(), "broken pipe");

        let err = Error::MalformedInput("target device is empty".into());
        assert_eq!(err.humanize(), "malformed input: target device is empty");
    }
}
