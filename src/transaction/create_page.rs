//! Defines the page for recording a new transaction.

use axum::{http::StatusCode, response::Response};
use maud::{Markup, html};

use crate::{
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE, base,
        dollar_input_styles, render,
    },
    navigation::NavBar,
};

/// Renders the page for recording a transaction.
///
/// The form posts as multipart form data because it carries the receipt
/// image along with the text fields.
pub async fn get_new_transaction_page() -> Response {
    let nav_bar = NavBar::new(endpoints::NEW_TRANSACTION_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-md"
            {
                h1 class="text-xl font-bold mb-4" { "Record a transaction" }

                form
                    hx-post=(endpoints::TRANSACTIONS_API)
                    hx-encoding="multipart/form-data"
                    class="space-y-4"
                {
                    (transaction_form_fields())

                    button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Upload" }
                }
            }
        }
    };

    render(
        StatusCode::OK,
        base("New Transaction", &[dollar_input_styles()], &content),
    )
}

fn transaction_form_fields() -> Markup {
    html! {
        div
        {
            label
                for="cost"
                class=(FORM_LABEL_STYLE)
            {
                "Cost"
            }

            div class="input-wrapper w-full"
            {
                input
                    name="cost"
                    id="cost"
                    type="number"
                    step="0.01"
                    placeholder="0.01"
                    class=(FORM_TEXT_INPUT_STYLE);
            }
        }

        div
        {
            label
                for="supplier"
                class=(FORM_LABEL_STYLE)
            {
                "Supplier"
            }

            input
                name="supplier"
                id="supplier"
                type="text"
                placeholder="Supplier"
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label
                for="description"
                class=(FORM_LABEL_STYLE)
            {
                "Description"
            }

            input
                name="description"
                id="description"
                type="text"
                placeholder="Description"
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label
                for="date"
                class=(FORM_LABEL_STYLE)
            {
                "Date"
            }

            // A text input rather than a date picker: dates are recorded in
            // the app's historical mm/dd/yyyy shape, which the server checks.
            input
                name="date"
                id="date"
                type="text"
                placeholder="mm/dd/yyyy"
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label
                for="image"
                class=(FORM_LABEL_STYLE)
            {
                "Receipt image"
            }

            input
                name="image"
                id="image"
                type="file"
                accept="image/*"
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}

#[cfg(test)]
mod view_tests {
    use axum::{body::Body, http::StatusCode, response::Response};
    use scraper::{ElementRef, Html};

    use crate::endpoints;

    use super::get_new_transaction_page;

    #[tokio::test]
    async fn new_transaction_returns_form() {
        let response = get_new_transaction_page().await;

        assert_status_ok(&response);
        let document = parse_html(response).await;
        assert_valid_html(&document);
        assert_correct_form(&document);
    }

    #[track_caller]
    fn assert_status_ok(response: &Response<Body>) {
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[track_caller]
    fn assert_valid_html(html: &Html) {
        assert!(
            html.errors.is_empty(),
            "Got HTML parsing errors: {:?}",
            html.errors
        );
    }

    #[track_caller]
    fn assert_correct_form(document: &Html) {
        let form_selector = scraper::Selector::parse("form").unwrap();
        let forms = document.select(&form_selector).collect::<Vec<_>>();
        assert_eq!(forms.len(), 1, "want 1 form, got {}", forms.len());

        let form = forms.first().unwrap();
        let hx_post = form.value().attr("hx-post");
        assert_eq!(
            hx_post,
            Some(endpoints::TRANSACTIONS_API),
            "want form with attribute hx-post=\"{}\", got {:?}",
            endpoints::TRANSACTIONS_API,
            hx_post
        );

        let hx_encoding = form.value().attr("hx-encoding");
        assert_eq!(
            hx_encoding,
            Some("multipart/form-data"),
            "want form with attribute hx-encoding=\"multipart/form-data\", got {hx_encoding:?}"
        );

        assert_correct_inputs(form);
        assert_has_submit_button(form);
    }

    #[track_caller]
    fn assert_correct_inputs(form: &ElementRef) {
        let expected_inputs = [
            ("cost", "number"),
            ("supplier", "text"),
            ("description", "text"),
            ("date", "text"),
            ("image", "file"),
        ];

        for (name, element_type) in expected_inputs {
            let selector_string = format!("input[name={name}]");
            let input_selector = scraper::Selector::parse(&selector_string).unwrap();
            let inputs = form.select(&input_selector).collect::<Vec<_>>();
            assert_eq!(
                inputs.len(),
                1,
                "want 1 input named {name}, got {}",
                inputs.len()
            );

            let input_type = inputs.first().unwrap().value().attr("type");
            assert_eq!(
                input_type,
                Some(element_type),
                "want input {name} with type=\"{element_type}\", got {input_type:?}"
            );
        }
    }

    #[track_caller]
    fn assert_has_submit_button(form: &ElementRef) {
        let button_selector = scraper::Selector::parse("button").unwrap();
        let buttons = form.select(&button_selector).collect::<Vec<_>>();
        assert_eq!(buttons.len(), 1, "want 1 button, got {}", buttons.len());
        let button_type = buttons.first().unwrap().value().attr("type");
        assert_eq!(
            button_type,
            Some("submit"),
            "want button with type=\"submit\", got {button_type:?}"
        );
    }

    async fn parse_html(response: Response) -> Html {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("Could not get response body");
        let text = String::from_utf8_lossy(&body).to_string();

        Html::parse_document(&text)
    }
}
