//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use formflow_domain::error::{FormflowError, SchemaError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`FormflowError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(FormflowError);

impl From<FormflowError> for ApiError {
    fn from(err: FormflowError) -> Self {
        Self(err)
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        Self(FormflowError::Schema(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            FormflowError::Schema(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            FormflowError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            FormflowError::Authorization(err) => (StatusCode::FORBIDDEN, err.to_string()),
            FormflowError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            FormflowError::Publish(err) => {
                tracing::warn!(error = %err, "event not accepted by broker");
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            FormflowError::ActionExecution(err) => {
                tracing::error!(error = %err, "unexpected action error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            FormflowError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_domain::error::{AuthorizationError, NotFoundError, PublishError};

    fn status_of(err: FormflowError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn should_map_each_error_family_to_its_status() {
        assert_eq!(
            status_of(SchemaError::MissingDiscriminator { family: "event" }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(FormflowError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(
                AuthorizationError {
                    user: "u".to_string(),
                    event: "e".to_string()
                }
                .into()
            ),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(
                NotFoundError {
                    entity: "Pipeline",
                    id: "x".to_string()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                PublishError {
                    event_type: "FormSubmission",
                    source: "down".into()
                }
                .into()
            ),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(FormflowError::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
