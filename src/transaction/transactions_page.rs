//! Defines the route handler for the page that displays transactions as a table.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::Response,
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    AppState, Error, endpoints,
    endpoints::format_endpoint,
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, format_currency, render,
    },
    navigation::NavBar,
    pagination::{PaginationConfig, PaginationIndicator, create_pagination_indicators},
};

use super::core::{Transaction, get_all_transactions};

/// The max number of graphemes to display in the transaction table rows before
/// truncating and displaying ellipses.
const MAX_DESCRIPTION_GRAPHEMES: usize = 32;

/// The state needed for the transactions page.
#[derive(Debug, Clone)]
pub struct TransactionsViewState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls how many rows to display per page.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionsViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for the transactions page.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// The page of transactions to display.
    pub page: Option<u64>,
}

/// Render an overview of the recorded transactions.
///
/// Transactions are sorted with [Transaction::compare], in code rather than
/// in SQL: the packed date key deliberately orders by month before day before
/// year, which `ORDER BY date` on the text column would not reproduce.
pub async fn get_transactions_page(
    State(state): State<TransactionsViewState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, Error> {
    let mut transactions = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_all_transactions(&connection)
            .inspect_err(|error| tracing::error!("could not get transactions: {error}"))?
    };

    transactions.sort_by(|a, b| a.compare(b));

    let page_size = state.pagination_config.default_page_size.max(1) as usize;
    let page_count = transactions.len().div_ceil(page_size).max(1) as u64;
    let curr_page = query
        .page
        .unwrap_or(state.pagination_config.default_page)
        .clamp(1, page_count);

    let rows: Vec<Transaction> = transactions
        .into_iter()
        .skip((curr_page as usize - 1) * page_size)
        .take(page_size)
        .collect();

    let indicators =
        create_pagination_indicators(curr_page, page_count, state.pagination_config.max_pages);

    Ok(render(
        StatusCode::OK,
        transactions_view(&rows, &indicators),
    ))
}

fn transactions_view(transactions: &[Transaction], indicators: &[PaginationIndicator]) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-4xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Transactions" }

                    a href=(endpoints::NEW_TRANSACTION_VIEW) class=(LINK_STYLE)
                    {
                        "Record Transaction"
                    }
                }

                @if transactions.is_empty() {
                    p { "No transactions yet." }
                } @else {
                    section class="rounded bg-gray-50 dark:bg-gray-800 overflow-hidden"
                    {
                        table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                        {
                            thead class=(TABLE_HEADER_STYLE)
                            {
                                tr
                                {
                                    th class=(TABLE_CELL_STYLE) { "Date" }
                                    th class=(TABLE_CELL_STYLE) { "Description" }
                                    th class=(TABLE_CELL_STYLE) { "Supplier" }
                                    th class=(TABLE_CELL_STYLE) { "Cost" }
                                    th class=(TABLE_CELL_STYLE) { span class="sr-only" { "View" } }
                                }
                            }

                            tbody
                            {
                                @for transaction in transactions {
                                    (transaction_row(transaction))
                                }
                            }
                        }
                    }

                    (pagination_controls(indicators))
                }
            }
        }
    };

    base("Transactions", &[], &content)
}

fn transaction_row(transaction: &Transaction) -> Markup {
    let detail_url = format_endpoint(endpoints::TRANSACTION_VIEW, transaction.id);

    html! {
        tr class=(TABLE_ROW_STYLE)
        {
            td class=(TABLE_CELL_STYLE) { (transaction.date) }
            td class=(TABLE_CELL_STYLE) { (truncate_description(&transaction.description)) }
            td class=(TABLE_CELL_STYLE) { (transaction.suppliers) }
            td class=(TABLE_CELL_STYLE) { (format_currency(transaction.cost)) }
            td class=(TABLE_CELL_STYLE)
            {
                a href=(detail_url) class=(LINK_STYLE) { "View" }
            }
        }
    }
}

fn truncate_description(description: &str) -> String {
    let graphemes: Vec<&str> = description.graphemes(true).collect();

    if graphemes.len() <= MAX_DESCRIPTION_GRAPHEMES {
        description.to_owned()
    } else {
        format!("{}…", graphemes[..MAX_DESCRIPTION_GRAPHEMES].concat())
    }
}

fn pagination_controls(indicators: &[PaginationIndicator]) -> Markup {
    let page_url = |page: u64| format!("{}?page={page}", endpoints::TRANSACTIONS_VIEW);

    html! {
        @if indicators.len() > 1 {
            nav aria-label="Transaction pages"
            {
                ul class="inline-flex -space-x-px text-sm"
                {
                    @for indicator in indicators {
                        li
                        {
                            @match indicator {
                                PaginationIndicator::BackButton(page) => {
                                    a href=(page_url(*page)) class=(LINK_STYLE) { "Previous" }
                                }
                                PaginationIndicator::Page(page) => {
                                    a href=(page_url(*page)) class=(LINK_STYLE) { (page) }
                                }
                                PaginationIndicator::CurrPage(page) => {
                                    span aria-current="page" class="font-bold" { (page) }
                                }
                                PaginationIndicator::Ellipsis => {
                                    span { "…" }
                                }
                                PaginationIndicator::NextButton(page) => {
                                    a href=(page_url(*page)) class=(LINK_STYLE) { "Next" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
