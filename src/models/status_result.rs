//! Status API reply and the decision it implies for a record.

use crate::constants::THROTTLE_ERROR_CODE;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Decoded reply of the status API for one message.
///
/// Missing and `null` fields decode as zero values so that partial replies
/// still decide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResult {
    #[serde(deserialize_with = "null_as_default")]
    pub status: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub err: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub error: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error_code: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What the processor must do with a record given its status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    /// The caller is being rate limited or blocked upstream.
    Throttled,
    /// The message was rejected; report and store the failure status.
    Rejected,
    /// Final delivery outcome with the gateway's error detail.
    Delivered { status: i64, err: i64 },
    /// No outcome yet; try again next cycle.
    Undecided,
}

impl StatusResult {
    /// Decode a reply body. A body that is not valid JSON yields the
    /// zero-valued result, which decides as [`StatusDecision::Undecided`].
    pub fn decode(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    error = %e,
                    body = %String::from_utf8_lossy(&body[..body.len().min(256)]),
                    "Unparseable status reply, leaving record unresolved"
                );
                Self::default()
            }
        }
    }

    pub fn decision(&self) -> StatusDecision {
        if self.error_code > 0 {
            if self.error_code >= THROTTLE_ERROR_CODE {
                StatusDecision::Throttled
            } else {
                StatusDecision::Rejected
            }
        } else if self.status > 0 {
            StatusDecision::Delivered {
                status: self.status,
                err: self.err,
            }
        } else {
            StatusDecision::Undecided
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_reply() {
        let result = StatusResult::decode(br#"{"status":0,"err":0,"error":"","error_code":6}"#);
        assert_eq!(result.error_code, 6);
        assert_eq!(result.decision(), StatusDecision::Throttled);
    }

    #[test]
    fn error_code_four_is_throttling() {
        let result = StatusResult {
            error_code: 4,
            ..Default::default()
        };
        assert_eq!(result.decision(), StatusDecision::Throttled);
    }

    #[test]
    fn low_error_codes_reject() {
        for code in 1..=3 {
            let result = StatusResult {
                status: 1,
                error_code: code,
                ..Default::default()
            };
            assert_eq!(result.decision(), StatusDecision::Rejected, "code {code}");
        }
    }

    #[test]
    fn delivered_carries_err() {
        let result = StatusResult::decode(br#"{"status":3,"err":1,"error":"","error_code":0}"#);
        assert_eq!(
            result.decision(),
            StatusDecision::Delivered { status: 3, err: 1 }
        );
    }

    #[test]
    fn non_positive_status_is_undecided() {
        let pending = StatusResult::decode(br#"{"status":0,"err":0}"#);
        assert_eq!(pending.decision(), StatusDecision::Undecided);

        let negative = StatusResult {
            status: -1,
            ..Default::default()
        };
        assert_eq!(negative.decision(), StatusDecision::Undecided);
    }

    #[test]
    fn malformed_body_decodes_to_default() {
        let result = StatusResult::decode(b"<html>502 Bad Gateway</html>");
        assert_eq!(result, StatusResult::default());
        assert_eq!(result.decision(), StatusDecision::Undecided);
    }

    #[test]
    fn null_fields_keep_zero_values() {
        let result =
            StatusResult::decode(br#"{"status":1,"err":0,"error":null,"error_code":0}"#);
        assert_eq!(result.error, "");
        assert_eq!(
            result.decision(),
            StatusDecision::Delivered { status: 1, err: 0 }
        );

        let throttled = StatusResult::decode(br#"{"status":null,"err":null,"error":"slow down","error_code":5}"#);
        assert_eq!(throttled.status, 0);
        assert_eq!(throttled.decision(), StatusDecision::Throttled);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let result = StatusResult::decode(br#"{"error":"duplicate request","error_code":9}"#);
        assert_eq!(result.status, 0);
        assert_eq!(result.error, "duplicate request");
        assert_eq!(result.decision(), StatusDecision::Throttled);
    }
}
