//! Outcome classification for API responses.
//!
//! Every request ends in exactly one of three classes. The mapping to the
//! wire-level code is exhaustive, so adding a class forces every consumer
//! to handle it.

use serde::Serialize;

use crate::ports::{BusError, CacheError};

/// Result of an application operation, as seen by the API layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The operation completed. `data` is optional; a message-only
    /// acknowledgment is valid.
    Success { message: String, data: Option<T> },
    /// Client-caused failure (bad input, missing entity).
    BusinessFailure(String),
    /// Infrastructure-caused failure (serialization, cache, bus).
    SystemFailure(String),
}

/// JSON body sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    /// Omitted when absent or when it serializes to `null`.
    #[serde(skip_serializing_if = "is_absent")]
    pub data: Option<T>,
}

fn is_absent<T: Serialize>(data: &Option<T>) -> bool {
    match data {
        None => true,
        Some(value) => serde_json::to_value(value).map_or(false, |v| v.is_null()),
    }
}

impl<T> Outcome<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Outcome::Success {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn acknowledged(message: impl Into<String>) -> Self {
        Outcome::Success {
            message: message.into(),
            data: None,
        }
    }

    pub fn business_failure(message: impl Into<String>) -> Self {
        Outcome::BusinessFailure(message.into())
    }

    pub fn system_failure(message: impl Into<String>) -> Self {
        Outcome::SystemFailure(message.into())
    }

    /// Builds an outcome from the legacy integer taxonomy
    /// (`0` success, `-2` business failure, `-1` system failure).
    pub fn from_legacy(ret: i32, message: impl Into<String>, data: Option<T>) -> Option<Self> {
        let message = message.into();
        match ret {
            0 => Some(Outcome::Success { message, data }),
            -2 => Some(Outcome::BusinessFailure(message)),
            -1 => Some(Outcome::SystemFailure(message)),
            _ => None,
        }
    }

    /// Wire-level code for this outcome.
    pub fn code(&self) -> u16 {
        match self {
            Outcome::Success { .. } => 200,
            Outcome::BusinessFailure(_) => 400,
            Outcome::SystemFailure(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Success { message, .. } => message,
            Outcome::BusinessFailure(message) | Outcome::SystemFailure(message) => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Converts into the response body.
    pub fn into_envelope(self) -> Envelope<T> {
        let code = self.code();
        match self {
            Outcome::Success { message, data } => Envelope {
                code,
                message,
                data,
            },
            Outcome::BusinessFailure(message) | Outcome::SystemFailure(message) => Envelope {
                code,
                message,
                data: None,
            },
        }
    }
}

impl<T> From<CacheError> for Outcome<T> {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound { .. } => Outcome::BusinessFailure(err.to_string()),
            CacheError::Ambiguous { .. }
            | CacheError::Unavailable(_)
            | CacheError::Timeout(_)
            | CacheError::InvalidKey(_) => Outcome::SystemFailure(err.to_string()),
        }
    }
}

impl<T> From<BusError> for Outcome<T> {
    fn from(err: BusError) -> Self {
        Outcome::SystemFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn codes_cover_all_classes() {
        assert_eq!(Outcome::success("ok", 1).code(), 200);
        assert_eq!(Outcome::<()>::business_failure("bad").code(), 400);
        assert_eq!(Outcome::<()>::system_failure("down").code(), 500);
    }

    #[test]
    fn success_with_data_serializes_data() {
        let body = serde_json::to_value(Outcome::success("found", json!({"id": 7})).into_envelope())
            .unwrap();
        assert_eq!(body, json!({"code": 200, "message": "found", "data": {"id": 7}}));
    }

    #[test]
    fn null_data_is_omitted() {
        let body = serde_json::to_value(
            Outcome::success("ok", serde_json::Value::Null).into_envelope(),
        )
        .unwrap();
        assert_eq!(body, json!({"code": 200, "message": "ok"}));

        let body = serde_json::to_value(Outcome::success("ok", ()).into_envelope()).unwrap();
        assert_eq!(body, json!({"code": 200, "message": "ok"}));
    }

    #[test]
    fn acknowledgment_omits_data() {
        let body = serde_json::to_value(Outcome::<()>::acknowledged("deleted").into_envelope())
            .unwrap();
        assert_eq!(body, json!({"code": 200, "message": "deleted"}));
    }

    #[test]
    fn failures_never_carry_data() {
        let body =
            serde_json::to_value(Outcome::<u32>::business_failure("user exists").into_envelope())
                .unwrap();
        assert_eq!(body, json!({"code": 400, "message": "user exists"}));
    }

    #[test]
    fn legacy_codes_map_to_classes() {
        assert!(Outcome::from_legacy(0, "ok", Some(1)).unwrap().is_success());
        assert_eq!(Outcome::<()>::from_legacy(-2, "bad", None).unwrap().code(), 400);
        assert_eq!(Outcome::<()>::from_legacy(-1, "down", None).unwrap().code(), 500);
        assert!(Outcome::<()>::from_legacy(3, "?", None).is_none());
    }

    #[test]
    fn cache_not_found_is_business_failure() {
        let outcome: Outcome<()> = CacheError::NotFound {
            target: "sess:1".to_string(),
        }
        .into();
        assert_eq!(outcome.code(), 400);
    }

    #[test]
    fn cache_transport_errors_are_system_failures() {
        let outcome: Outcome<()> = CacheError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(outcome.code(), 500);

        let outcome: Outcome<()> = CacheError::Ambiguous {
            pattern: "sess:*".to_string(),
            count: 2,
        }
        .into();
        assert_eq!(outcome.code(), 500);
    }

    #[test]
    fn bus_errors_are_system_failures() {
        let outcome: Outcome<()> = BusError::Closed.into();
        assert_eq!(outcome.code(), 500);
        assert!(outcome.message().contains("closed"));
    }
}
