use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use utoipa::{PartialSchema, ToSchema};

#[derive(Error, Debug, Serialize)]
pub enum CommonError {
    #[error("request could not be authenticated: {msg}")]
    Authentication {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("could not find resource: {msg}")]
    NotFound {
        msg: String,
        lookup_id: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(
        #[serde(skip)]
        #[from]
        anyhow::Error,
    ),
    #[error("invalid request: {msg}")]
    InvalidRequest {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("invalid response: {msg}")]
    InvalidResponse {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("io error")]
    IoError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("serde json error")]
    SerdeSerializationError {
        #[serde(skip)]
        #[from]
        #[source]
        source: serde_json::Error,
    },
    #[error("address parse error")]
    AddrParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("reqwest error")]
    ReqwestError {
        #[serde(skip)]
        #[from]
        #[source]
        source: reqwest::Error,
    },
}

impl CommonError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommonError::NotFound { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            CommonError::Authentication { .. } => "Authentication",
            CommonError::NotFound { .. } => "NotFound",
            CommonError::InvalidRequest { .. } => "InvalidRequest",
            CommonError::InvalidResponse { .. } => "InvalidResponse",
            CommonError::Unknown(_)
            | CommonError::IoError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::ReqwestError { .. } => "InternalServerError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CommonError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            CommonError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::InvalidResponse { .. }
            | CommonError::Unknown(_)
            | CommonError::IoError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::ReqwestError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ToSchema for CommonError {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Error")
    }
}

impl PartialSchema for CommonError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .property(
                "name",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("name")
            .property(
                "message",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("message")
            .into()
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            name: self.name().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    name: String,
    message: String,
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_not_found_maps_to_404() {
            let err = CommonError::NotFound {
                msg: "user not found".to_string(),
                lookup_id: "U123".to_string(),
                source: None,
            };
            assert!(err.is_not_found());
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        }

        #[test]
        fn test_invalid_request_maps_to_400() {
            let err = CommonError::InvalidRequest {
                msg: "bad body".to_string(),
                source: None,
            };
            assert!(!err.is_not_found());
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }

        #[test]
        fn test_authentication_maps_to_401() {
            let err = CommonError::Authentication {
                msg: "bad signature".to_string(),
                source: None,
            };
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }

        #[test]
        fn test_unknown_maps_to_500() {
            let err = CommonError::Unknown(anyhow::anyhow!("boom"));
            assert_eq!(err.name(), "InternalServerError");
            assert_eq!(
                err.into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }

        #[test]
        fn test_error_body_has_name_and_message() {
            let schema = serde_json::to_value(CommonError::schema()).unwrap();
            assert_eq!(schema["required"], serde_json::json!(["name", "message"]));
            assert_eq!(<CommonError as ToSchema>::name(), "Error");
        }

        #[test]
        fn test_display_includes_message() {
            let err = CommonError::InvalidResponse {
                msg: "missing entries".to_string(),
                source: None,
            };
            assert_eq!(err.to_string(), "invalid response: missing entries");
        }
    }
}
