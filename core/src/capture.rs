use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to read captured text: {0}")]
pub struct CaptureError(pub String);

/// Source of the text a hotkey invocation operates on (the clipboard in the app).
pub trait TextSource: Send + Sync {
    fn read_text(&self) -> Result<String, CaptureError>;
}

/// Text captured for one invocation, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedQuery(String);

impl CapturedQuery {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CapturedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed text source, handy for tests and scripted invocations.
#[derive(Debug, Clone, Default)]
pub struct StaticText(pub String);

impl TextSource for StaticText {
    fn read_text(&self) -> Result<String, CaptureError> {
        Ok(self.0.clone())
    }
}
