//! Identify endpoint: reconcile an (email, phone number) pair into one identity
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::{error, info};

use crate::api::ErrorResponse;
use crate::metrics;
use crate::reconcile::{ConsolidatedContact, Identifiers};
use crate::shared_state::AppState;

pub const MISSING_IDENTIFIER_ERROR: &str = "At least one of email or phoneNumber is required.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default, deserialize_with = "deserialize_email")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_phone_number")]
    pub phone_number: Option<String>,
}

impl IdentifyRequest {
    /// An empty or whitespace-only body is treated as `{}`.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }

    pub fn identifiers(self) -> Option<Identifiers> {
        Identifiers::new(self.email, self.phone_number)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contact: ConsolidatedContact,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPhoneNumber {
    Text(String),
    Number(serde_json::Number),
}

fn deserialize_email<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|email| !email.is_empty()))
}

/// Phone numbers arrive either as strings or as bare JSON integers.
fn deserialize_phone_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawPhoneNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawPhoneNumber::Text(text)) => Ok(Some(text).filter(|phone| !phone.is_empty())),
        Some(RawPhoneNumber::Number(number)) if number.is_i64() || number.is_u64() => {
            Ok(Some(number.to_string()))
        }
        Some(RawPhoneNumber::Number(number)) => Err(de::Error::custom(format!(
            "phoneNumber must be a string or an integer, got {}",
            number
        ))),
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

/// POST /identify
pub async fn identify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let request = IdentifyRequest::from_body(&body).map_err(|e| {
        metrics::inc_request("identify", "bad_request");
        reject(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    })?;

    let Some(identifiers) = request.identifiers() else {
        metrics::inc_request("identify", "bad_request");
        return Err(reject(StatusCode::BAD_REQUEST, MISSING_IDENTIFIER_ERROR));
    };

    match state.identity_worker.identify(identifiers).await {
        Ok((reconciliation, elapsed)) => {
            metrics::observe_reconcile_duration(elapsed.as_secs_f64());
            if let Some(created) = &reconciliation.created {
                metrics::inc_contacts_created(created.link.precedence().as_str());
            }
            if !reconciliation.merge.demoted.is_empty() {
                info!(
                    primary_contact_id = reconciliation.contact.primary_contact_id,
                    demoted = reconciliation.merge.demoted.len(),
                    "Identify request merged clusters"
                );
                metrics::inc_clusters_merged(reconciliation.merge.demoted.len());
            }
            metrics::inc_request("identify", "ok");
            Ok(Json(IdentifyResponse {
                contact: reconciliation.contact,
            }))
        }
        Err(e) => {
            error!("Identity reconciliation failed: {:#}", e);
            metrics::inc_request("identify", "error");
            Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_has_no_identifiers() {
        let request = IdentifyRequest::from_body(b"").unwrap();
        assert!(request.identifiers().is_none());

        let request = IdentifyRequest::from_body(b"  \n").unwrap();
        assert!(request.identifiers().is_none());
    }

    #[test]
    fn test_nulls_and_empty_strings_count_as_absent() {
        let request = IdentifyRequest::from_body(br#"{"email": null, "phoneNumber": ""}"#).unwrap();
        assert!(request.identifiers().is_none());

        let request = IdentifyRequest::from_body(br#"{"email": "", "phoneNumber": null}"#).unwrap();
        assert!(request.identifiers().is_none());
    }

    #[test]
    fn test_numeric_phone_number_is_accepted() {
        let ids = IdentifyRequest::from_body(br#"{"phoneNumber": 123456}"#)
            .unwrap()
            .identifiers()
            .unwrap();
        assert_eq!(ids.phone_number(), Some("123456"));
        assert_eq!(ids.email(), None);
    }

    #[test]
    fn test_fractional_phone_number_is_rejected() {
        assert!(IdentifyRequest::from_body(br#"{"phoneNumber": 12.5}"#).is_err());
        assert!(IdentifyRequest::from_body(br#"{"phoneNumber": true}"#).is_err());
        assert!(IdentifyRequest::from_body(b"not json").is_err());
    }

    #[test]
    fn test_identifiers_are_matched_verbatim() {
        let ids = IdentifyRequest::from_body(br#"{"email": "Doc@HillValley.edu", "phoneNumber": "123456"}"#)
            .unwrap()
            .identifiers()
            .unwrap();
        assert_eq!(ids.email(), Some("Doc@HillValley.edu"));
    }
}
