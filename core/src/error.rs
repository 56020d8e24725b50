use serde::Serialize;

/// Failure classes surfaced by the query pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MissingCredential,
    EmptyInput,
    TransientProviderError,
    PermanentProviderError,
    PersistenceError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::EmptyInput => "empty_input",
            Self::TransientProviderError => "transient_provider_error",
            Self::PermanentProviderError => "permanent_provider_error",
            Self::PersistenceError => "persistence_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
