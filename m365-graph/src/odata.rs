use serde::{Deserialize, Serialize};

/// The `error` object of an OData error response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct Envelope {
    error: ODataError,
}

impl ODataError {
    /// Parses an error response body, falling back to the raw text when it
    /// is not an OData error.
    pub fn parse(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => Self {
                code: status.to_string(),
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.to_string()
                },
            },
        }
    }

    pub fn is_bad_request(&self) -> bool {
        self.code == "BadRequest"
    }
}
