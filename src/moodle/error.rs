// src/moodle/error.rs
// =============================================================================
// Errors that fail a whole run: the link set could not be collected.
//
// Individual link failures never end up here; those are LinkOutcome values
// inside the records.
// =============================================================================

use thiserror::Error;

/// Failures talking to the upstream Moodle site.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid Moodle base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("request to Moodle failed ({function}): {source}")]
    Http {
        function: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Moodle returned HTTP {status} for {function}")]
    Status { function: String, status: u16 },

    #[error("could not decode Moodle response for {function}: {source}")]
    Decode {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    /// Moodle reports web service errors as HTTP 200 with an exception body
    #[error("Moodle error in {function} ({errorcode}): {message}")]
    Moodle {
        function: String,
        errorcode: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SourceError::Moodle {
            function: "core_course_get_courses".into(),
            errorcode: "invalidtoken".into(),
            message: "Invalid token - token not found".into(),
        };
        let text = err.to_string();
        assert!(text.contains("invalidtoken"));
        assert!(text.contains("core_course_get_courses"));

        let err = SourceError::Status { function: "mod_assign_get_assignments".into(), status: 502 };
        assert_eq!(err.to_string(), "Moodle returned HTTP 502 for mod_assign_get_assignments");
    }
}
