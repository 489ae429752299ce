//! Defines the page that displays a single transaction and its receipt.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::Response,
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    html::{FORM_LABEL_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base, format_currency, render},
    navigation::NavBar,
};

use super::core::{Transaction, TransactionId, get_transaction};

/// The state needed for the transaction detail page.
#[derive(Debug, Clone)]
pub struct TransactionViewState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Render a single transaction with its receipt image.
///
/// Returns the 404 page if `transaction_id` does not refer to a recorded
/// transaction.
pub async fn get_transaction_page(
    State(state): State<TransactionViewState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Response, Error> {
    let transaction = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_transaction(transaction_id, &connection)
            .inspect_err(|error| tracing::error!("could not get transaction: {error}"))?
    };

    Ok(render(StatusCode::OK, transaction_view(&transaction)))
}

fn transaction_view(transaction: &Transaction) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();

    let field = |label: &str, value: &str| {
        html! {
            div
            {
                dt class=(FORM_LABEL_STYLE) { (label) }
                dd { (value) }
            }
        }
    };

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-md space-y-4"
            {
                h1 class="text-xl font-bold" { "Transaction" }

                dl class="space-y-2"
                {
                    (field("Date", transaction.date.as_ref()))
                    (field("Description", &transaction.description))
                    (field("Supplier", &transaction.suppliers))
                    (field("Cost", &format_currency(transaction.cost)))
                }

                img
                    src=(transaction.url)
                    alt="Receipt image"
                    class="w-full rounded border border-gray-300 dark:border-gray-600";

                a href=(endpoints::TRANSACTIONS_VIEW) class=(LINK_STYLE)
                {
                    "Back to transactions"
                }
            }
        }
    };

    base("Transaction", &[], &content)
}
