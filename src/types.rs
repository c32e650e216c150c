use crate::patterns::Language;
use serde::{Deserialize, Serialize};

/// One discovery record for a probed TLS endpoint.
///
/// Exactly one of two shapes holds: either `error` is set and every
/// connection-derived field is `None`, or `error` is `None` and the
/// handshake-derived fields carry whatever the server presented.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TlsFinding {
    pub host: String,
    pub port: u16,
    pub protocol: Option<String>,
    pub cipher_suite: Option<String>,
    pub cert_subject: Option<String>,
    pub cert_issuer: Option<String>,
    pub cert_not_before: Option<String>,
    pub cert_not_after: Option<String>,
    pub error: Option<String>,
}

impl TlsFinding {
    /// Record for a target that could not be connected to or handshaken with.
    pub fn failure(host: impl Into<String>, port: u16, error: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: None,
            cipher_suite: None,
            cert_subject: None,
            cert_issuer: None,
            cert_not_before: None,
            cert_not_after: None,
            error: Some(error.into()),
        }
    }
}

/// One pattern match inside a scanned source file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CodeFinding {
    pub file_path: String,
    pub language: Language,
    /// The literal regex that matched, not a symbolic name.
    pub pattern: String,
    /// Match plus surrounding context, newlines collapsed, at most 200 chars.
    pub snippet: String,
}
