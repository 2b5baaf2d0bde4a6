use serde::Serialize;

/// Structured failure reported on stderr as `{"error": ..., "kind": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtonErrorOut {
    #[serde(rename = "error")]
    pub message: String,
    pub kind: String,
}

impl ProtonErrorOut {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new("protonConfigError", message)
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new("protonUsageError", message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new("authError", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("notFound", message)
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::new("httpError", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("timeout", message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new("apiError", message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == "notFound"
    }
}

impl std::fmt::Display for ProtonErrorOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
