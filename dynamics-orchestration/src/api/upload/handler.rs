//! Classifies slice responses into continue, complete or failure

use log::{debug, warn};
use serde::de::DeserializeOwned;

use super::session::{UploadResult, UploadSession};
use crate::api::request::RawResponse;
use crate::error::{OrchestrationError, Result};

pub const LOCATION_HEADER: &str = "Location";
const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Turns the response to a slice PUT into an [`UploadResult`]
///
/// * 2xx with no body and a `Location` header: the item was created elsewhere
/// * 200/201 with a JSON body that decodes as `T`: the created item
/// * a session body with outstanding ranges (any status): keep uploading
/// * anything else is a remote failure or an ambiguous completion
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadResponseHandler;

impl UploadResponseHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_response<T: DeserializeOwned>(&self, response: RawResponse) -> Result<UploadResult<T>> {
        let status = response.status;

        if response.is_success() && !response.has_body() {
            return match response.header(LOCATION_HEADER) {
                Some(location) => {
                    debug!("Upload finished, item created at {}", location);
                    Ok(UploadResult::Location(location.to_string()))
                }
                None => Err(OrchestrationError::AmbiguousUploadCompletion {
                    status,
                    body: String::new(),
                }),
            };
        }

        if matches!(status, 200 | 201) && is_json(&response) {
            if let Ok(item) = serde_json::from_slice::<T>(&response.body) {
                return Ok(UploadResult::Completed(item));
            }
            debug!("Slice body with status {} is not the uploaded item", status);
        }

        match serde_json::from_slice::<UploadSession>(&response.body) {
            Ok(session) if !session.next_expected_ranges.is_empty() => {
                if !response.is_success() {
                    warn!(
                        "Slice answered with status {} but the session still expects {:?}",
                        status, session.next_expected_ranges
                    );
                }
                Ok(UploadResult::InProgress(session))
            }
            Ok(_) if response.is_success() => {
                serde_json::from_slice::<T>(&response.body)
                    .map(UploadResult::Completed)
                    .map_err(|_| OrchestrationError::AmbiguousUploadCompletion {
                        status,
                        body: response.body_text(),
                    })
            }
            _ if response.is_success() => Err(OrchestrationError::AmbiguousUploadCompletion {
                status,
                body: response.body_text(),
            }),
            _ => Err(OrchestrationError::RemoteFailure {
                status,
                body: response.body_text(),
            }),
        }
    }
}

fn is_json(response: &RawResponse) -> bool {
    response
        .header(CONTENT_TYPE_HEADER)
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct DriveItem {
        id: String,
        name: String,
    }

    fn handle(response: RawResponse) -> Result<UploadResult<DriveItem>> {
        UploadResponseHandler::new().handle_response(response)
    }

    #[test]
    fn test_created_item_completes() {
        let result = handle(RawResponse::json(201, &json!({"id": "01ABC", "name": "report.pdf"}))).unwrap();
        assert_eq!(
            result.into_item(),
            Some(DriveItem {
                id: "01ABC".to_string(),
                name: "report.pdf".to_string()
            })
        );
    }

    #[test]
    fn test_created_item_with_odata_content_type() {
        let response = RawResponse::new(200)
            .with_header("content-type", "application/json; odata.metadata=minimal")
            .with_body(r#"{"id": "01ABC", "name": "report.pdf"}"#);
        assert!(handle(response).unwrap().is_upload_successful());
    }

    #[test]
    fn test_created_session_body_continues() {
        let response = RawResponse::json(201, &json!({"nextExpectedRanges": ["4-"]}));
        let result = handle(response).unwrap();
        assert_eq!(result.session().unwrap().next_expected_ranges, vec!["4-"]);

        let untyped = RawResponse::new(200).with_body(r#"{"nextExpectedRanges": ["8-"]}"#);
        assert!(matches!(handle(untyped).unwrap(), UploadResult::InProgress(_)));
    }

    #[test]
    fn test_created_non_json_body_is_ambiguous() {
        let response = RawResponse::new(201)
            .with_header("Content-Type", "text/plain")
            .with_body("created");
        let err = handle(response).unwrap_err();
        match err {
            OrchestrationError::AmbiguousUploadCompletion { status, body } => {
                assert_eq!(status, 201);
                assert_eq!(body, "created");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_body_with_location() {
        let response = RawResponse::new(201).with_header("location", "https://host/items/01ABC");
        let result = handle(response).unwrap();
        assert_eq!(result.location(), Some("https://host/items/01ABC"));
    }

    #[test]
    fn test_empty_body_without_location_is_ambiguous() {
        let err = handle(RawResponse::new(204)).unwrap_err();
        assert!(matches!(err, OrchestrationError::AmbiguousUploadCompletion { status: 204, .. }));
    }

    #[test]
    fn test_accepted_session_continues() {
        let response = RawResponse::json(
            202,
            &json!({"expirationDateTime": "2030-01-01T00:00:00Z", "nextExpectedRanges": ["327680-"]}),
        );
        let result = handle(response).unwrap();
        assert_eq!(result.session().unwrap().next_expected_ranges, vec!["327680-"]);
    }

    #[test]
    fn test_session_body_on_error_status_continues() {
        let response = RawResponse::json(416, &json!({"nextExpectedRanges": ["0-"]}));
        assert!(matches!(handle(response).unwrap(), UploadResult::InProgress(_)));
    }

    #[test]
    fn test_accepted_item_body_completes() {
        let response = RawResponse::json(202, &json!({"id": "01ABC", "name": "report.pdf"}));
        assert!(handle(response).unwrap().is_upload_successful());
    }

    #[test]
    fn test_accepted_unknown_body_is_ambiguous() {
        let response = RawResponse::json(202, &json!({"nextExpectedRanges": []}));
        let err = handle(response).unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_error_status_without_session_fails() {
        let response = RawResponse::json(500, &json!({"error": {"code": "generalException"}}));
        let err = handle(response).unwrap_err();
        assert!(matches!(err, OrchestrationError::RemoteFailure { status: 500, .. }));
        assert!(err.is_retryable());
    }
}
