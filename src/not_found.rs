//! Defines the template and route handler for the 404 not found page.
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// The page to display when a route or resource does not exist.
pub struct NotFoundPage;

impl NotFoundPage {
    pub fn into_html(self) -> Html<String> {
        Html(
            error_view(
                "Not Found",
                "404",
                "Sorry, we couldn't find that page.",
                "Check the address, or head back to the transactions page.",
            )
            .into_string(),
        )
    }
}

impl IntoResponse for NotFoundPage {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, self.into_html()).into_response()
    }
}

pub async fn get_404_not_found() -> Response {
    NotFoundPage.into_response()
}
