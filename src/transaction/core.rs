//! Defines the core data models and database queries for transactions.

use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use rusqlite::{Connection, Row};
use serde_json::{Map, Value};

use crate::Error;

use super::validate::is_valid_date;

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a transaction.
pub type TransactionId = i64;

/// A validated `MM/DD/YYYY` date string.
///
/// Dates are kept as text rather than converted to a calendar type because
/// the stored form of a transaction carries the date exactly as the user
/// entered it. The constructor guarantees the shape, which lets
/// [TransactionDate::ordering_key] read digits by position without
/// re-parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDate(String);

impl TransactionDate {
    /// Create a transaction date.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::MalformedDate] if `date` is not a
    /// real calendar date written as `MM/DD/YYYY`.
    pub fn new(date: &str) -> Result<Self, Error> {
        if is_valid_date(date) {
            Ok(Self(date.to_string()))
        } else {
            Err(Error::MalformedDate)
        }
    }

    /// Create a transaction date without validation.
    ///
    /// The caller should ensure that the string is a valid `MM/DD/YYYY` date,
    /// e.g. because it was already validated before being written to the
    /// database. This function has `_unchecked` in the name but is not
    /// `unsafe`, because if the shape invariant is violated the date will
    /// sort and display incorrectly but not affect memory safety.
    pub fn new_unchecked(date: &str) -> Self {
        Self(date.to_string())
    }

    /// Pack the date into a single integer for ordering transactions.
    ///
    /// The key is `month * 1_000_000 + day * 10_000 + year`, so the month
    /// dominates the day and the day dominates the year. This is the ordering
    /// the app has always stored and displayed; it is deliberately not
    /// chronological across years, and existing data relies on it, so do not
    /// "fix" it to be year-major.
    pub fn ordering_key(&self) -> i64 {
        let digits = self.0.as_bytes();
        let number = |range: std::ops::Range<usize>| {
            digits[range]
                .iter()
                .fold(0_i64, |total, digit| total * 10 + i64::from(digit - b'0'))
        };

        number(0..2) * 1_000_000 + number(3..5) * 10_000 + number(6..10)
    }
}

impl AsRef<str> for TransactionDate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionDate::new(s)
    }
}

impl Display for TransactionDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inventory purchase: what was bought, from whom, when, for how much, and
/// a link to the stored receipt image.
///
/// To create a new `Transaction`, use [Transaction::build] followed by
/// [create_transaction], which assigns the database ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// What the purchase cost, in dollars.
    pub cost: f64,
    /// A text description of what was bought.
    pub description: String,
    /// The supplier the purchase was made from.
    ///
    /// The plural name is historical: the field holds a single supplier, but
    /// it is the key existing stored records use.
    pub suppliers: String,
    /// When the purchase happened, as entered by the user.
    pub date: TransactionDate,
    /// The URL of the stored receipt image.
    pub url: String,
}

impl Transaction {
    /// The mapping key for the cost field.
    pub const COST: &'static str = "cost";
    /// The mapping key for the description field.
    pub const DESCRIPTION: &'static str = "description";
    /// The mapping key for the supplier field.
    pub const SUPPLIERS: &'static str = "suppliers";
    /// The mapping key for the date field.
    pub const DATE: &'static str = "date";
    /// The mapping key for the receipt image URL.
    pub const URL: &'static str = "url";

    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    ///
    /// Construction does not validate: the form validator checks the raw
    /// field text before a builder is ever created, and `url` is expected to
    /// be the durable URL returned by the image store.
    pub fn build(
        cost: f64,
        description: &str,
        suppliers: &str,
        url: &str,
        date: TransactionDate,
    ) -> TransactionBuilder {
        TransactionBuilder {
            cost,
            description: description.to_owned(),
            suppliers: suppliers.to_owned(),
            date,
            url: url.to_owned(),
        }
    }

    /// Order two transactions by their packed date keys.
    ///
    /// This is a total order usable with any standard sort, e.g.
    /// `transactions.sort_by(|a, b| a.compare(b))`. Transactions on the same
    /// calendar date compare equal, so a stable sort leaves them in insertion
    /// order. See [TransactionDate::ordering_key] for what "order" means
    /// here.
    pub fn compare(&self, other: &Transaction) -> Ordering {
        self.date.ordering_key().cmp(&other.date.ordering_key())
    }

    /// Serialize the transaction to its stored key/value form.
    ///
    /// The mapping has exactly the keys `cost` (number), `description`,
    /// `suppliers`, `date` and `url` (strings). This shape is the layout of
    /// already-persisted records and must not change. The database ID is a
    /// storage detail and is not part of the mapping.
    pub fn to_mapping(&self) -> Map<String, Value> {
        let mut mapping = Map::new();
        mapping.insert(Self::COST.to_owned(), self.cost.into());
        mapping.insert(Self::DESCRIPTION.to_owned(), self.description.clone().into());
        mapping.insert(Self::SUPPLIERS.to_owned(), self.suppliers.clone().into());
        mapping.insert(Self::DATE.to_owned(), self.date.to_string().into());
        mapping.insert(Self::URL.to_owned(), self.url.clone().into());

        mapping
    }
}

/// The field values for a [Transaction] that has not been saved yet.
///
/// Finalize the builder with [create_transaction], which inserts the row and
/// returns the [Transaction] with its assigned ID.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// What the purchase cost, in dollars.
    pub cost: f64,
    /// A text description of what was bought.
    pub description: String,
    /// The supplier the purchase was made from.
    pub suppliers: String,
    /// When the purchase happened.
    pub date: TransactionDate,
    /// The URL of the stored receipt image.
    pub url: String,
}

impl TransactionBuilder {
    /// Deserialize a transaction from its stored key/value form.
    ///
    /// This is the inverse of [Transaction::to_mapping]. Unlike a
    /// deserializer that fills in defaults, a mapping that is missing a key
    /// or carries the wrong type of value is rejected.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::MissingRecordKey] if one of the five keys is absent,
    /// - [Error::InvalidRecordValue] if a value has the wrong type,
    /// - or [Error::MalformedDate] if the date value is not a valid
    ///   `MM/DD/YYYY` date.
    pub fn from_mapping(mapping: &Map<String, Value>) -> Result<Self, Error> {
        let text = |key: &'static str| {
            mapping
                .get(key)
                .ok_or(Error::MissingRecordKey(key))?
                .as_str()
                .ok_or(Error::InvalidRecordValue(key))
        };

        let cost = mapping
            .get(Transaction::COST)
            .ok_or(Error::MissingRecordKey(Transaction::COST))?
            .as_f64()
            .ok_or(Error::InvalidRecordValue(Transaction::COST))?;
        let description = text(Transaction::DESCRIPTION)?.to_owned();
        let suppliers = text(Transaction::SUPPLIERS)?.to_owned();
        let date = TransactionDate::new(text(Transaction::DATE)?)?;
        let url = text(Transaction::URL)?.to_owned();

        Ok(Self {
            cost,
            description,
            suppliers,
            date,
            url,
        })
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (cost, description, suppliers, date, url)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, cost, description, suppliers, date, url",
        )?
        .query_one(
            (
                builder.cost,
                builder.description,
                builder.suppliers,
                builder.date.as_ref(),
                builder.url,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, cost, description, suppliers, date, url FROM \"transaction\" WHERE id = :id",
        )?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve every transaction in the database, in storage order.
///
/// Callers that want the display order should sort the result with
/// [Transaction::compare]; the packed date ordering is applied in code
/// because it does not match what `ORDER BY date` would produce.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare("SELECT id, cost, description, suppliers, date, url FROM \"transaction\"")?
        .query_map([], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u64, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count as u64)
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cost REAL NOT NULL,
                description TEXT NOT NULL,
                suppliers TEXT NOT NULL,
                date TEXT NOT NULL,
                url TEXT NOT NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// The date column only ever holds dates that passed validation on the way
/// in, so it is wrapped without re-checking.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let cost = row.get(1)?;
    let description = row.get(2)?;
    let suppliers = row.get(3)?;
    let date = row.get::<usize, String>(4)?;
    let url = row.get(5)?;

    Ok(Transaction {
        id,
        cost,
        description,
        suppliers,
        date: TransactionDate::new_unchecked(&date),
        url,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod model_tests {
    use std::cmp::Ordering;

    use serde_json::json;

    use crate::Error;

    use super::{Transaction, TransactionBuilder, TransactionDate};

    fn transaction_dated(date: &str) -> Transaction {
        Transaction {
            id: 1,
            cost: 5.0,
            description: "description".to_owned(),
            suppliers: "suppliers".to_owned(),
            date: TransactionDate::new(date).unwrap(),
            url: "image_link".to_owned(),
        }
    }

    #[test]
    fn transactions_sort_by_packed_date_key() {
        // Regression fixture: within a single four digit year range, the
        // packed key puts mid-1999 before New Year's Day 2000.
        let mut transactions = vec![
            transaction_dated("01/01/2000"),
            transaction_dated("06/15/1999"),
            transaction_dated("12/31/1999"),
        ];

        transactions.sort_by(|a, b| a.compare(b));

        let got: Vec<&str> = transactions
            .iter()
            .map(|transaction| transaction.date.as_ref())
            .collect();
        assert_eq!(got, ["06/15/1999", "12/31/1999", "01/01/2000"]);
    }

    #[test]
    fn compare_is_transitive() {
        let a = transaction_dated("01/02/2000");
        let b = transaction_dated("03/04/2000");
        let c = transaction_dated("05/06/2000");

        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&c), Ordering::Less);
        assert_eq!(a.compare(&c), Ordering::Less);
    }

    #[test]
    fn same_date_compares_equal() {
        let a = transaction_dated("01/02/2000");
        let b = transaction_dated("01/02/2000");

        assert_eq!(a.compare(&b), Ordering::Equal);
    }

    #[test]
    fn to_mapping_has_exactly_the_stored_keys() {
        let transaction = transaction_dated("01/09/1999");

        let mapping = transaction.to_mapping();

        let mut keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["cost", "date", "description", "suppliers", "url"]);
        assert_eq!(mapping["cost"], json!(5.0));
        assert_eq!(mapping["date"], json!("01/09/1999"));
        assert_eq!(mapping["url"], json!("image_link"));
    }

    #[test]
    fn mapping_round_trips() {
        let transaction = transaction_dated("01/09/1999");

        let builder = TransactionBuilder::from_mapping(&transaction.to_mapping()).unwrap();

        let want = Transaction::build(
            transaction.cost,
            &transaction.description,
            &transaction.suppliers,
            &transaction.url,
            transaction.date.clone(),
        );
        assert_eq!(builder, want);
    }

    #[test]
    fn from_mapping_fails_on_missing_key() {
        let mut mapping = transaction_dated("01/09/1999").to_mapping();
        mapping.remove(Transaction::SUPPLIERS);

        let got = TransactionBuilder::from_mapping(&mapping);

        assert_eq!(got, Err(Error::MissingRecordKey(Transaction::SUPPLIERS)));
    }

    #[test]
    fn from_mapping_fails_on_wrong_value_type() {
        let mut mapping = transaction_dated("01/09/1999").to_mapping();
        mapping.insert(Transaction::COST.to_owned(), json!("5.00"));

        let got = TransactionBuilder::from_mapping(&mapping);

        assert_eq!(got, Err(Error::InvalidRecordValue(Transaction::COST)));
    }

    #[test]
    fn from_mapping_fails_on_malformed_date() {
        let mut mapping = transaction_dated("01/09/1999").to_mapping();
        mapping.insert(Transaction::DATE.to_owned(), json!("13/40/1999"));

        let got = TransactionBuilder::from_mapping(&mapping);

        assert_eq!(got, Err(Error::MalformedDate));
    }
}

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{
        Transaction, TransactionDate, count_transactions, create_transaction,
        get_all_transactions, get_transaction,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn date(date: &str) -> TransactionDate {
        TransactionDate::new(date).unwrap()
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();

        let result = create_transaction(
            Transaction::build(5.0, "desc", "acme", "/images/receipt.png", date("01/09/1999")),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.id, 1);
                assert_eq!(transaction.cost, 5.0);
                assert_eq!(transaction.description, "desc");
                assert_eq!(transaction.suppliers, "acme");
                assert_eq!(transaction.date.as_ref(), "01/09/1999");
                assert_eq!(transaction.url, "/images/receipt.png");
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn get_returns_created_transaction() {
        let conn = get_test_connection();
        let created = create_transaction(
            Transaction::build(12.3, "nails", "hardware co", "/images/a.png", date("02/29/2000")),
            &conn,
        )
        .expect("Could not create transaction");

        let got = get_transaction(created.id, &conn).expect("Could not get transaction");

        assert_eq!(got, created);
    }

    #[test]
    fn get_fails_on_unknown_id() {
        let conn = get_test_connection();

        let got = get_transaction(99, &conn);

        assert_eq!(got, Err(Error::NotFound));
    }

    #[test]
    fn get_all_returns_every_row() {
        let conn = get_test_connection();
        for i in 1..=3 {
            create_transaction(
                Transaction::build(i as f64, "", "", "", date("01/09/1999")),
                &conn,
            )
            .expect("Could not create transaction");
        }

        let got = get_all_transactions(&conn).expect("Could not get transactions");

        assert_eq!(got.len(), 3);
    }

    #[test]
    fn get_count() {
        let conn = get_test_connection();
        let want_count = 20;
        for i in 1..=want_count {
            create_transaction(
                Transaction::build(i as f64, "", "", "", date("01/09/1999")),
                &conn,
            )
            .expect("Could not create transaction");
        }

        let got_count = count_transactions(&conn).expect("Could not get count");

        assert_eq!(want_count, got_count);
    }
}
