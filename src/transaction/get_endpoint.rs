//! Defines the endpoint for fetching a transaction in its serialized form.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::{AppState, Error};

use super::core::{TransactionId, get_transaction};

/// The state needed to fetch a transaction.
#[derive(Debug, Clone)]
pub struct GetTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GetTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for getting a transaction as its stored key/value
/// mapping.
///
/// The body has exactly the keys `cost`, `description`, `suppliers`, `date`
/// and `url`; the database ID stays in the URL.
///
/// # Errors
/// Returns the status code 404 if the requested transaction does not exist.
pub async fn get_transaction_endpoint(
    State(state): State<GetTransactionState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Map<String, Value>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = get_transaction(transaction_id, &connection)?;

    Ok(Json(transaction.to_mapping()))
}
