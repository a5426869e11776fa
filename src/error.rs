use actix_web::{HttpResponse, ResponseError};
use reqwest::StatusCode;
use serde_json::json;

/// Every failure a handler can surface. The first five variants are domain
/// errors raised deliberately at precondition checks; they carry a fixed
/// status code and response body. Everything below `Validation` is an
/// infrastructure failure that collapses to a generic 500 body.
#[derive(thiserror::Error)]
pub enum ApiError {
    #[error("This email is already subscribed to the newsletter.")]
    ExistingEmail,
    #[error("Invalid token.")]
    InvalidToken { redirect_url: String },
    #[error("This email is not subscribed to the newsletter. Check that the email is correct.")]
    InvalidEmail,
    #[error("Email not confirmed. Check your inbox and confirm your email first.")]
    UnconfirmedEmail,
    #[error("Email already added to the members list.")]
    AlreadyMember,
    #[error("{0}")]
    Validation(String),
    #[error("Failed to execute a database query.")]
    Database(#[from] sqlx::Error),
    #[error("Request to the newsletter API failed.")]
    NewsletterApi(#[source] reqwest::Error),
    #[error("Failed to send an email.")]
    SendEmail(#[source] reqwest::Error),
    #[error("Cache operation failed.")]
    Cache(#[from] redis::RedisError),
    #[error("Failed to serialize a cached payload.")]
    Serialization(#[from] serde_json::Error),
}

const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Try again later.";

impl ApiError {
    fn is_unexpected(&self) -> bool {
        matches!(
            self,
            ApiError::Database(_)
                | ApiError::NewsletterApi(_)
                | ApiError::SendEmail(_)
                | ApiError::Cache(_)
                | ApiError::Serialization(_)
        )
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;

        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            write!(f, "\nCaused by:\n\t{}", cause)?;
            source = cause.source();
        }

        Ok(())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ExistingEmail | ApiError::AlreadyMember => StatusCode::OK,
            ApiError::InvalidToken { .. }
            | ApiError::InvalidEmail
            | ApiError::UnconfirmedEmail
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_unexpected() {
            tracing::error!("{:?}", self);

            return HttpResponse::InternalServerError().json(json!({
                "error": { "message": GENERIC_ERROR_MESSAGE }
            }));
        }

        match self {
            // Masked as success: indistinguishable from a fresh member sign-up
            ApiError::AlreadyMember => HttpResponse::Ok().json(json!({
                "message": self.to_string()
            })),
            ApiError::ExistingEmail => HttpResponse::Ok().json(json!({
                "error": { "message": self.to_string() }
            })),
            ApiError::InvalidToken { redirect_url } => HttpResponse::BadRequest().json(json!({
                "error": { "message": self.to_string() },
                "redirectURL": redirect_url
            })),
            _ => HttpResponse::BadRequest().json(json!({
                "error": { "message": self.to_string() }
            })),
        }
    }
}
