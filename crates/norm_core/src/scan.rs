//! Strict mapping of result rows into `serde` models.
//!
//! # Responsibility
//! - Turn each row into a column-name keyed object and decode the model from it.
//! - Enforce strictness in both directions: fields need columns, columns need fields.
//!
//! # Invariants
//! - `ScanShape::Row` with no rows is `NotFound`, never a scan error.
//! - `ScanShape::Rows` with no rows decodes an empty sequence.
//! - Duplicate column names are rejected before any row is decoded.
//! - Models must serialize every field they decode; mapping is verified by
//!   re-serializing the decoded value.

use crate::context::Context;
use crate::error::{NormError, NormResult};
use rusqlite::types::ValueRef;
use rusqlite::{Row, Rows};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Whether a reader's model is one row or a sequence of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanShape {
    /// The model is decoded from the first row; no row means `NotFound`.
    Row,
    /// The model is a sequence decoded from every row.
    Rows,
}

impl ScanShape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Rows => "rows",
        }
    }
}

/// Row mapping failure.
#[derive(Debug)]
pub enum ScanError {
    Sqlite(rusqlite::Error),
    /// Two result columns share a name.
    DuplicateColumn(String),
    /// A result column has no destination field.
    UnmappedColumn(String),
    /// A destination field has no result column.
    MissingColumn(String),
    /// A text column is not valid UTF-8.
    InvalidText(String),
    /// The destination could not be decoded from the row values.
    Decode(serde_json::Error),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::DuplicateColumn(column) => write!(f, "duplicate column `{column}`"),
            Self::UnmappedColumn(column) => {
                write!(f, "column `{column}` has no destination field")
            }
            Self::MissingColumn(field) => write!(f, "field `{field}` has no source column"),
            Self::InvalidText(column) => write!(f, "column `{column}` is not valid UTF-8"),
            Self::Decode(err) => write!(f, "decode destination: {err}"),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::DuplicateColumn(_)
            | Self::UnmappedColumn(_)
            | Self::MissingColumn(_)
            | Self::InvalidText(_) => None,
        }
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Decodes `rows` into `M` according to `shape`.
pub fn scan<M>(ctx: &Context<'_>, rows: &mut Rows<'_>, shape: ScanShape) -> NormResult<M>
where
    M: DeserializeOwned + Serialize,
{
    match shape {
        ScanShape::Row => scan_one(rows),
        ScanShape::Rows => scan_all(ctx, rows),
    }
}

/// Decodes the first row into `M`.
pub fn scan_one<M>(rows: &mut Rows<'_>) -> NormResult<M>
where
    M: DeserializeOwned + Serialize,
{
    let columns = column_names(rows)?;
    let Some(row) = rows.next().map_err(NormError::execute)? else {
        return Err(NormError::NotFound);
    };

    let object = row_object(row, &columns)?;
    let decoded: M = serde_json::from_value(Value::Object(object)).map_err(ScanError::Decode)?;
    verify_mapped(&decoded, &columns)?;
    Ok(decoded)
}

/// Decodes every row into the sequence model `M`.
pub fn scan_all<M>(ctx: &Context<'_>, rows: &mut Rows<'_>) -> NormResult<M>
where
    M: DeserializeOwned + Serialize,
{
    let columns = column_names(rows)?;
    let mut items = Vec::new();

    while let Some(row) = rows.next().map_err(NormError::execute)? {
        ctx.check()?;
        items.push(Value::Object(row_object(row, &columns)?));
    }

    let decoded: M = serde_json::from_value(Value::Array(items)).map_err(ScanError::Decode)?;
    verify_mapped(&decoded, &columns)?;
    Ok(decoded)
}

fn column_names(rows: &Rows<'_>) -> Result<Vec<String>, ScanError> {
    let names = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
        if !seen.insert(*name) {
            return Err(ScanError::DuplicateColumn((*name).to_string()));
        }
    }

    Ok(names.into_iter().map(str::to_string).collect())
}

fn row_object(row: &Row<'_>, columns: &[String]) -> Result<Map<String, Value>, ScanError> {
    let mut object = Map::with_capacity(columns.len());

    for (index, name) in columns.iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(integer) => Value::from(integer),
            ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => return Err(ScanError::InvalidText(name.clone())),
            },
            ValueRef::Blob(bytes) => Value::Array(bytes.iter().copied().map(Value::from).collect()),
        };
        object.insert(name.clone(), value);
    }

    Ok(object)
}

fn verify_mapped<M: Serialize>(decoded: &M, columns: &[String]) -> Result<(), ScanError> {
    let encoded = serde_json::to_value(decoded).map_err(ScanError::Decode)?;
    match &encoded {
        Value::Object(fields) => verify_object(fields, columns),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(fields) => verify_object(fields, columns)?,
                    _ => return first_unmapped(columns),
                }
            }
            Ok(())
        }
        _ => first_unmapped(columns),
    }
}

fn verify_object(fields: &Map<String, Value>, columns: &[String]) -> Result<(), ScanError> {
    if let Some(column) = columns.iter().find(|column| !fields.contains_key(column.as_str())) {
        return Err(ScanError::UnmappedColumn(column.clone()));
    }
    // Optional and defaulted fields decode without a column; reject them here.
    if let Some(field) = fields
        .keys()
        .find(|field| !columns.iter().any(|column| column == *field))
    {
        return Err(ScanError::MissingColumn(field.clone()));
    }
    Ok(())
}

fn first_unmapped(columns: &[String]) -> Result<(), ScanError> {
    match columns.first() {
        Some(column) => Err(ScanError::UnmappedColumn(column.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{scan, ScanError, ScanShape};
    use crate::context::Context;
    use crate::error::{ErrorKind, NormError};
    use rusqlite::Connection;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        qty: i64,
        price: Option<f64>,
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id TEXT PRIMARY KEY, qty INTEGER NOT NULL, price REAL);
             INSERT INTO items VALUES ('a', 1, 2.5), ('b', 2, NULL);",
        )
        .unwrap();
        conn
    }

    fn run<M>(conn: &Connection, sql: &str, shape: ScanShape) -> Result<M, NormError>
    where
        M: serde::de::DeserializeOwned + Serialize,
    {
        let ctx = Context::new();
        let mut stmt = conn.prepare(sql).unwrap();
        let mut rows = stmt.query([]).unwrap();
        scan(&ctx, &mut rows, shape)
    }

    #[test]
    fn scans_one_row_into_struct() {
        let conn = setup();
        let item: Item = run(
            &conn,
            "SELECT id, qty, price FROM items WHERE id = 'a'",
            ScanShape::Row,
        )
        .unwrap();
        assert_eq!(
            item,
            Item {
                id: "a".to_string(),
                qty: 1,
                price: Some(2.5),
            }
        );
    }

    #[test]
    fn no_row_is_not_found() {
        let conn = setup();
        let err = run::<Item>(
            &conn,
            "SELECT id, qty, price FROM items WHERE id = 'zzz'",
            ScanShape::Row,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn scans_all_rows_in_order() {
        let conn = setup();
        let items: Vec<Item> = run(
            &conn,
            "SELECT id, qty, price FROM items ORDER BY id",
            ScanShape::Rows,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].price, None);

        let empty: Vec<Item> = run(
            &conn,
            "SELECT id, qty, price FROM items WHERE 0",
            ScanShape::Rows,
        )
        .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn extra_column_is_rejected() {
        let conn = setup();
        let err = run::<Item>(
            &conn,
            "SELECT id, qty, price, 1 AS extra FROM items WHERE id = 'a'",
            ScanShape::Row,
        )
        .unwrap_err();
        assert!(matches!(err, NormError::Scan(ScanError::UnmappedColumn(ref c)) if c == "extra"));
    }

    #[test]
    fn missing_column_is_rejected() {
        let conn = setup();
        let err = run::<Item>(&conn, "SELECT id, price FROM items", ScanShape::Rows).unwrap_err();
        assert!(matches!(err, NormError::Scan(ScanError::Decode(_))));
    }

    #[test]
    fn optional_field_without_column_is_rejected() {
        let conn = setup();
        let err = run::<Item>(
            &conn,
            "SELECT id, qty FROM items WHERE id = 'a'",
            ScanShape::Row,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scan);
        assert!(matches!(err, NormError::Scan(ScanError::MissingColumn(ref f)) if f == "price"));

        let err = run::<Vec<Item>>(&conn, "SELECT id, qty FROM items", ScanShape::Rows).unwrap_err();
        assert!(matches!(err, NormError::Scan(ScanError::MissingColumn(ref f)) if f == "price"));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let conn = setup();
        let err = run::<Item>(
            &conn,
            "SELECT id, qty, price, id FROM items",
            ScanShape::Row,
        )
        .unwrap_err();
        assert!(matches!(err, NormError::Scan(ScanError::DuplicateColumn(ref c)) if c == "id"));
    }

    #[test]
    fn cancelled_scope_stops_multi_row_scan() {
        let conn = setup();
        let ctx = Context::new();
        ctx.cancel_token().cancel();
        let mut stmt = conn.prepare("SELECT id, qty, price FROM items").unwrap();
        let mut rows = stmt.query([]).unwrap();
        let err = scan::<Vec<Item>>(&ctx, &mut rows, ScanShape::Rows).unwrap_err();
        assert!(err.is_cancelled());
    }
}
