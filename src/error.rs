use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Calculation failed: {0}")]
    Calculation(String),
    #[error("Misconfigured: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Persistence(_) | Self::Calculation(_) | Self::Config(_) => {
                Status::InternalServerError
            }
            Self::Jwt(_) | Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::Validation(_) => Status::UnprocessableEntity,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
        }
    }
}

/// Body of every error response.
#[derive(Serialize)]
struct ErrorMessage {
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Internal details stay in the log.
        let message = if status.code >= 500 {
            error!("{self}");
            "Internal server error".to_string()
        } else {
            warn!("{self}");
            self.to_string()
        };
        Response::build_from(Json(ErrorMessage { message }).respond_to(req)?)
            .status(status)
            .ok()
    }
}
