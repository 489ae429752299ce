//! Validation for the new transaction form.
//!
//! The checks here are pure functions over the raw text the client submitted:
//! they touch no database, network or page state, so they can be unit tested
//! without a server. The route handlers map the returned [Error] onto an
//! alert for the field at fault.

use std::fmt::Display;

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::Error;

/// The format a date must parse under once its separators are replaced with
/// dashes, e.g. "01/09/1999" is checked as "01-09-1999".
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[month]-[day]-[year]");

/// The form fields a user fills in to record a transaction.
///
/// Used to attribute a validation failure to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    /// The cost of the purchase in dollars.
    Cost,
    /// The supplier the purchase was made from.
    Supplier,
    /// A text description of the purchase.
    Description,
    /// The date of the purchase as `MM/DD/YYYY`.
    Date,
}

impl Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormField::Cost => "cost",
            FormField::Supplier => "supplier",
            FormField::Description => "description",
            FormField::Date => "date",
        };

        write!(f, "{name}")
    }
}

/// Whether `text` contains nothing but whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Whether `date` is a real calendar date written as `MM/DD/YYYY`.
///
/// The shape check is strict: exactly ten characters, slashes at positions
/// two and five, ASCII digits everywhere else. `1/1/2000` fails on length,
/// `02/30/2021` fails the calendar check.
pub fn is_valid_date(date: &str) -> bool {
    if date.len() != 10 {
        return false;
    }

    for (i, character) in date.char_indices() {
        if i == 2 || i == 5 {
            if character != '/' {
                return false;
            }
        } else if !character.is_ascii_digit() {
            return false;
        }
    }

    Date::parse(&date.replace('/', "-"), DATE_FORMAT).is_ok()
}

/// Check the raw form fields for a new transaction.
///
/// Fields are checked in a fixed order and the first violation wins: cost,
/// then supplier, then description, then that a date was entered, then that
/// the date is well-formed. A form with several blank fields always reports
/// the earliest one per this order, never an aggregate.
///
/// # Errors
/// Returns [Error::MissingField] naming the blank field, or
/// [Error::MalformedDate] if the date does not pass [is_valid_date].
pub fn validate(cost: &str, description: &str, suppliers: &str, date: &str) -> Result<(), Error> {
    if is_blank(cost) {
        return Err(Error::MissingField(FormField::Cost));
    }

    if is_blank(suppliers) {
        return Err(Error::MissingField(FormField::Supplier));
    }

    if is_blank(description) {
        return Err(Error::MissingField(FormField::Description));
    }

    if is_blank(date) {
        return Err(Error::MissingField(FormField::Date));
    }

    if !is_valid_date(date) {
        return Err(Error::MalformedDate);
    }

    Ok(())
}
