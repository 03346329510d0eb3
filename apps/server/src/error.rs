use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use vigil::{SmtpError, VigilError};

use crate::config;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Engine(#[from] VigilError),
    #[error("Invalid target id '{0}'")]
    BadId(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Io(_) | AppError::Config(_) => "internal",
            AppError::BadId(_) => "invalid_config",
            AppError::Engine(e) => match e {
                VigilError::InvalidConfig(_) => "invalid_config",
                VigilError::DuplicateName(_) => "duplicate_name",
                VigilError::NotFound(_) => "not_found",
                VigilError::Store(_) => "store",
                VigilError::Smtp(smtp) => smtp.kind(),
                VigilError::Dispatch(_) => "dispatch",
                VigilError::Shutdown => "shutdown",
            },
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadId(_) => StatusCode::BAD_REQUEST,
            AppError::Engine(e) => match e {
                VigilError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                VigilError::NotFound(_) => StatusCode::NOT_FOUND,
                VigilError::DuplicateName(_) => StatusCode::CONFLICT,
                VigilError::Smtp(SmtpError::Auth(_)) => StatusCode::UNAUTHORIZED,
                VigilError::Smtp(SmtpError::InvalidConfig(_)) => StatusCode::BAD_REQUEST,
                VigilError::Smtp(_) => StatusCode::BAD_GATEWAY,
                VigilError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
                VigilError::Store(_) | VigilError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Io(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        HttpResponse::build(status).json(ErrorBody { error: self.kind(), message: self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil::TargetId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(VigilError::invalid("bad")), StatusCode::BAD_REQUEST),
            (AppError::from(VigilError::NotFound(TargetId::new())), StatusCode::NOT_FOUND),
            (AppError::from(VigilError::DuplicateName("a".into())), StatusCode::CONFLICT),
            (
                AppError::from(VigilError::Smtp(SmtpError::Auth("535".into()))),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::from(VigilError::Smtp(SmtpError::Connection("refused".into()))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(VigilError::Store(anyhow::anyhow!("disk full"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error}");
        }
    }

    #[test]
    fn test_auth_failure_kind() {
        let error = AppError::from(VigilError::Smtp(SmtpError::Auth("535".into())));
        assert_eq!(error.kind(), "smtp_auth");
    }
}
