//! Alerts for surfacing error messages to users.
//!
//! Alerts render as an htmx out-of-band swap targeting the `#alert-container`
//! element that [crate::html::base] places on every page, so any endpoint can
//! surface a message without re-rendering the page around it.

use axum::response::{Html, IntoResponse, Response};
use maud::{Markup, html};

/// A message to surface to the user at the bottom of the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Something went wrong, with extra details on what to do about it.
    Error {
        message: String,
        details: String,
    },
    /// Something went wrong, in one line.
    ErrorSimple {
        message: String,
    },
}

const ERROR_ALERT_STYLE: &str = "p-4 mb-4 text-sm text-red-800 rounded-lg \
    bg-red-50 dark:bg-gray-800 dark:text-red-400";

impl Alert {
    /// Render the alert as an out-of-band swap for the alert container.
    pub fn into_html(self) -> Html<String> {
        let (style, message, details) = match self {
            Alert::Error { message, details } => (ERROR_ALERT_STYLE, message, details),
            Alert::ErrorSimple { message } => (ERROR_ALERT_STYLE, message, String::new()),
        };

        let markup: Markup = html! {
            div id="alert-container" hx-swap-oob="true" class="w-full max-w-md px-4"
            {
                div class=(style) role="alert"
                {
                    span class="font-medium" { (message) }

                    @if !details.is_empty() {
                        " " (details)
                    }
                }
            }
        };

        Html(markup.into_string())
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod alert_tests {
    use scraper::{Html, Selector};

    use super::Alert;

    fn parse(alert: Alert) -> Html {
        Html::parse_fragment(&alert.into_html().0)
    }

    #[test]
    fn alert_targets_the_alert_container() {
        let document = parse(Alert::ErrorSimple {
            message: "Must enter a cost".to_owned(),
        });

        let selector = Selector::parse("div#alert-container[hx-swap-oob]").unwrap();
        assert_eq!(document.select(&selector).count(), 1);
    }

    #[test]
    fn alert_contains_message_and_details() {
        let document = parse(Alert::Error {
            message: "Upload failed".to_owned(),
            details: "The transaction was not saved.".to_owned(),
        });

        let text = document.root_element().text().collect::<String>();
        assert!(text.contains("Upload failed"), "got text {text:?}");
        assert!(
            text.contains("The transaction was not saved."),
            "got text {text:?}"
        );
    }
}
