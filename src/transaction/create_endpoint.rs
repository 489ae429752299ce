//! Defines the endpoint for recording a new transaction.
//!
//! Submissions arrive as multipart form data: four text fields plus the
//! receipt image. The handler validates the fields, stores the image, and
//! only then writes the transaction, so a record never points at an image
//! that was not saved. The write is not retried and a failed write does not
//! delete the already-stored image, so an orphaned image can remain; the
//! user just retries the submission.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{FromRef, Multipart, State, multipart::Field},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    image_store::{ImageStore, image_extension},
    transaction::{Transaction, core::create_transaction},
};

use super::{core::TransactionDate, validate::validate};

/// The state needed to record a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Where receipt images are stored.
    pub image_store: Arc<dyn ImageStore>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            image_store: state.image_store.clone(),
        }
    }
}

/// The raw values submitted from the new transaction form.
#[derive(Debug, Default)]
struct SubmittedForm {
    cost: String,
    description: String,
    suppliers: String,
    date: String,
    image: Option<SubmittedImage>,
}

#[derive(Debug)]
struct SubmittedImage {
    content_type: String,
    data: Bytes,
}

/// A route handler for recording a new transaction, redirects to the
/// transactions view on success.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    multipart: Multipart,
) -> Response {
    let form = match read_multipart_form(multipart).await {
        Ok(form) => form,
        Err(error) => {
            tracing::error!("could not read transaction form: {error}");
            return error.into_alert_response();
        }
    };

    if let Err(error) = validate(&form.cost, &form.description, &form.suppliers, &form.date) {
        return error.into_alert_response();
    }

    // The image check happens after field validation but before any bytes are
    // written anywhere.
    let Some(image) = form.image else {
        return Error::NoImageSelected.into_alert_response();
    };

    let extension = match image_extension(&image.content_type) {
        Ok(extension) => extension,
        Err(error) => return error.into_alert_response(),
    };

    let cost: f64 = match form.cost.trim().parse() {
        Ok(cost) => cost,
        Err(_) => return Error::InvalidCost(form.cost).into_alert_response(),
    };

    let date = match TransactionDate::new(&form.date) {
        Ok(date) => date,
        Err(error) => return error.into_alert_response(),
    };

    let url = match state
        .image_store
        .store(extension, &image.data, &|percent| {
            tracing::debug!("Uploaded {percent}%");
        })
        .await
    {
        Ok(url) => url,
        Err(error) => {
            // Terminal for this attempt: nothing has been written to the
            // database yet and nothing will be.
            tracing::error!("could not store receipt image: {error}");
            return error.into_alert_response();
        }
    };

    // The stored image's URL is what gets persisted, never the client's file
    // name or a placeholder.
    let builder = Transaction::build(cost, &form.description, &form.suppliers, &url, date);

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_transaction(builder, &connection) {
        Ok(transaction) => {
            tracing::info!(
                "recorded transaction {} from {} on {}",
                transaction.id,
                transaction.suppliers,
                transaction.date
            );

            (
                HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("could not create transaction: {error}");
            error.into_alert_response()
        }
    }
}

async fn read_multipart_form(mut multipart: Multipart) -> Result<SubmittedForm, Error> {
    let mut form = SubmittedForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.to_string()))?
    {
        match field.name() {
            Some("cost") => form.cost = read_text(field).await?,
            Some("description") => form.description = read_text(field).await?,
            Some("supplier") => form.suppliers = read_text(field).await?,
            Some("date") => form.date = read_text(field).await?,
            Some("image") => form.image = read_image(field).await?,
            name => {
                tracing::debug!("Ignoring unexpected multipart field {name:?}");
            }
        }
    }

    Ok(form)
}

async fn read_text(field: Field<'_>) -> Result<String, Error> {
    field.text().await.map_err(|error| {
        tracing::error!("Could not read text from multipart form field: {error}");
        Error::MultipartError("Could not read text from multipart form field.".to_owned())
    })
}

async fn read_image(field: Field<'_>) -> Result<Option<SubmittedImage>, Error> {
    let content_type = field.content_type().map(str::to_owned);

    let data = field.bytes().await.map_err(|error| {
        tracing::error!("Could not read data from multipart form field: {error}");
        Error::MultipartError("Could not read the uploaded image.".to_owned())
    })?;

    // Browsers submit an empty part for a file input the user left blank.
    if data.is_empty() {
        return Ok(None);
    }

    let content_type = content_type.ok_or_else(|| {
        Error::MultipartError("The image field has no content type.".to_owned())
    })?;

    tracing::debug!(
        "Received a {} byte receipt image ({content_type})",
        data.len()
    );

    Ok(Some(SubmittedImage { content_type, data }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use rusqlite::Connection;
    use tempfile::TempDir;

    use crate::{
        AppState, Error, build_router, endpoints,
        image_store::{ImageStore, LocalImageStore, ProgressFn},
        pagination::PaginationConfig,
        transaction::core::{count_transactions, get_transaction},
    };

    fn get_test_server(image_dir: &TempDir) -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            Arc::new(LocalImageStore::new(image_dir.path())),
            PaginationConfig::default(),
        )
        .unwrap();

        TestServer::new(build_router(state))
    }

    fn complete_form() -> MultipartForm {
        MultipartForm::new()
            .add_text("cost", "5.00")
            .add_text("description", "desc")
            .add_text("supplier", "acme")
            .add_text("date", "01/09/1999")
            .add_part(
                "image",
                Part::bytes(b"not really a png".to_vec())
                    .file_name("receipt.png")
                    .mime_type("image/png"),
            )
    }

    #[tokio::test]
    async fn submitting_a_valid_form_stores_the_transaction() {
        let image_dir = TempDir::new().unwrap();
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            Arc::new(LocalImageStore::new(image_dir.path())),
            PaginationConfig::default(),
        )
        .unwrap();
        let server = TestServer::new(build_router(state.clone()));

        let response = server
            .post(endpoints::TRANSACTIONS_API)
            .multipart(complete_form())
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        let redirect = response
            .headers()
            .get("hx-redirect")
            .expect("expected response to have the header hx-redirect");
        assert_eq!(redirect, endpoints::TRANSACTIONS_VIEW);

        let connection = state.db_connection.lock().unwrap();
        let transaction = get_transaction(1, &connection).unwrap();
        assert_eq!(transaction.cost, 5.0);
        assert_eq!(transaction.description, "desc");
        assert_eq!(transaction.suppliers, "acme");
        // The date is stored exactly as entered, and the URL is the stored
        // image's, not the uploaded file name.
        assert_eq!(transaction.date.as_ref(), "01/09/1999");
        assert!(
            transaction.url.starts_with("/images/"),
            "got url {}",
            transaction.url
        );
        assert!(transaction.url.ends_with(".png"), "got url {}", transaction.url);
    }

    #[tokio::test]
    async fn blank_form_reports_the_cost_first() {
        let image_dir = TempDir::new().unwrap();
        let server = get_test_server(&image_dir);

        let form = MultipartForm::new()
            .add_text("cost", "")
            .add_text("description", "")
            .add_text("supplier", "")
            .add_text("date", "");
        let response = server.post(endpoints::TRANSACTIONS_API).multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(
            response.text().contains("Must enter a cost"),
            "got body {}",
            response.text()
        );
    }

    #[tokio::test]
    async fn malformed_date_is_rejected() {
        let image_dir = TempDir::new().unwrap();
        let server = get_test_server(&image_dir);

        let form = MultipartForm::new()
            .add_text("cost", "5.00")
            .add_text("description", "desc")
            .add_text("supplier", "acme")
            .add_text("date", "02/30/2021");
        let response = server.post(endpoints::TRANSACTIONS_API).multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(
            response.text().contains("Enter a date as mm/dd/yyyy"),
            "got body {}",
            response.text()
        );
    }

    #[tokio::test]
    async fn missing_image_is_rejected_before_upload() {
        let image_dir = TempDir::new().unwrap();
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            Arc::new(LocalImageStore::new(image_dir.path())),
            PaginationConfig::default(),
        )
        .unwrap();
        let server = TestServer::new(build_router(state.clone()));

        let form = MultipartForm::new()
            .add_text("cost", "5.00")
            .add_text("description", "desc")
            .add_text("supplier", "acme")
            .add_text("date", "01/09/1999");
        let response = server.post(endpoints::TRANSACTIONS_API).multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(
            response.text().contains("No image selected"),
            "got body {}",
            response.text()
        );
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(&connection), Ok(0));
    }

    /// An image store that always fails, for exercising the upload failure
    /// branch.
    #[derive(Debug)]
    struct FailingImageStore;

    #[async_trait]
    impl ImageStore for FailingImageStore {
        async fn store(
            &self,
            _extension: &str,
            _data: &[u8],
            _report_progress: ProgressFn<'_>,
        ) -> Result<String, Error> {
            Err(Error::UploadFailed("the store is on fire".to_owned()))
        }
    }

    #[tokio::test]
    async fn failed_upload_persists_nothing() {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            Arc::new(FailingImageStore),
            PaginationConfig::default(),
        )
        .unwrap();
        let server = TestServer::new(build_router(state.clone()));

        let response = server
            .post(endpoints::TRANSACTIONS_API)
            .multipart(complete_form())
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            response.text().contains("Upload failed"),
            "got body {}",
            response.text()
        );
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(&connection), Ok(0));
    }

    #[tokio::test]
    async fn unsupported_image_type_is_rejected() {
        let image_dir = TempDir::new().unwrap();
        let server = get_test_server(&image_dir);

        let form = MultipartForm::new()
            .add_text("cost", "5.00")
            .add_text("description", "desc")
            .add_text("supplier", "acme")
            .add_text("date", "01/09/1999")
            .add_part(
                "image",
                Part::bytes(b"not an image".to_vec())
                    .file_name("receipt.csv")
                    .mime_type("text/csv"),
            );
        let response = server.post(endpoints::TRANSACTIONS_API).multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(
            response.text().contains("Unsupported image type"),
            "got body {}",
            response.text()
        );
    }
}
