//! Stocklog is a self-hosted web app for recording inventory purchases.
//!
//! Each transaction records what was bought, from whom, when, and for how
//! much, along with a photo of the receipt. This library provides an HTTP
//! server that directly serves HTML pages for entering and browsing
//! transactions.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod db;
pub mod endpoints;
mod html;
mod image_store;
mod internal_server_error;
mod logging;
mod navigation;
mod not_found;
mod pagination;
mod routing;
mod transaction;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use image_store::{ImageStore, LocalImageStore, ProgressFn};
pub use logging::logging_middleware;
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use transaction::FormField;

use crate::{alert::Alert, internal_server_error::InternalServerError, not_found::NotFoundPage};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A required form field was left blank.
    ///
    /// The wrapped [FormField] identifies the field at fault so the client
    /// can attach the message to the right input.
    #[error("Must enter a {0}")]
    MissingField(FormField),

    /// The date field was not a real calendar date in the `MM/DD/YYYY` shape.
    #[error("Enter a date as mm/dd/yyyy")]
    MalformedDate,

    /// The cost field could not be parsed as a number.
    #[error("\"{0}\" is not a valid cost")]
    InvalidCost(String),

    /// The form was submitted without choosing a receipt image.
    ///
    /// Detected locally, before any upload begins.
    #[error("no image was selected")]
    NoImageSelected,

    /// The uploaded file is not a supported image type.
    #[error("\"{0}\" is not a supported image type")]
    NotAnImage(String),

    /// The image store could not save the receipt image.
    ///
    /// This is terminal for the submission attempt: no transaction is
    /// persisted when the upload fails.
    #[error("could not store the receipt image: {0}")]
    UploadFailed(String),

    /// The multipart form could not be parsed.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// A serialized transaction mapping was missing a required key.
    ///
    /// Returned when deserializing a stored record rather than silently
    /// filling in zero or empty defaults.
    #[error("the serialized transaction is missing the key \"{0}\"")]
    MissingRecordKey(&'static str),

    /// A serialized transaction mapping had a value of the wrong type.
    #[error("the serialized transaction has an invalid value for the key \"{0}\"")]
    InvalidRecordValue(&'static str),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => NotFoundPage.into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// Convert the error into an HTTP response with an HTML alert.
    pub fn into_alert_response(self) -> Response {
        let (status_code, alert) = match self {
            error @ (Error::MissingField(_) | Error::MalformedDate) => (
                StatusCode::BAD_REQUEST,
                Alert::ErrorSimple {
                    message: error.to_string(),
                },
            ),
            Error::InvalidCost(cost) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid cost".to_owned(),
                    details: format!("\"{cost}\" could not be read as a dollar amount."),
                },
            ),
            Error::NoImageSelected => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "No image selected".to_owned(),
                    details: "Choose a receipt image before uploading.".to_owned(),
                },
            ),
            Error::NotAnImage(content_type) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Unsupported image type".to_owned(),
                    details: format!(
                        "\"{content_type}\" is not a supported image type. \
                        Upload a PNG, JPEG, GIF or WebP image."
                    ),
                },
            ),
            Error::UploadFailed(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Upload failed".to_owned(),
                    details: format!("{reason}. The transaction was not saved."),
                },
            ),
            Error::MultipartError(reason) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Could not read the submitted form".to_owned(),
                    details: reason,
                },
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                Alert::ErrorSimple {
                    message: "The requested transaction could not be found.".to_owned(),
                },
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Something went wrong".to_owned(),
                    details:
                        "An unexpected error occurred, check the server logs for more details."
                            .to_owned(),
                },
            ),
        };

        (status_code, alert.into_html()).into_response()
    }
}
