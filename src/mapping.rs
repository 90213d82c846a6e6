use chrono::NaiveDateTime;

use crate::error::SqlConduitError;
use crate::results::Row;

/// Build a value from one fetched row.
///
/// Implement this for record types; the scalar impls read the first column,
/// which suits single-column queries such as `SELECT id FROM ...`.
pub trait FromRow: Sized {
    /// # Errors
    /// Returns `SqlConduitError::Mapping` when a required column is missing,
    /// NULL, or of an unconvertible type.
    fn from_row(row: &Row) -> Result<Self, SqlConduitError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, SqlConduitError> {
        Ok(row.clone())
    }
}

/// Look up a required column, converting a miss into a mapping error.
///
/// # Errors
/// Returns `SqlConduitError::Mapping` naming the column when `getter` yields `None`.
pub fn required<T>(
    row: &Row,
    column: &str,
    getter: impl FnOnce(&Row, &str) -> Option<T>,
) -> Result<T, SqlConduitError> {
    getter(row, column).ok_or_else(|| {
        SqlConduitError::Mapping(format!("column '{column}' is missing, NULL or not convertible"))
    })
}

macro_rules! first_column {
    ($ty:ty, $getter:ident, $label:literal) => {
        impl FromRow for $ty {
            fn from_row(row: &Row) -> Result<Self, SqlConduitError> {
                row.$getter(0).ok_or_else(|| {
                    SqlConduitError::Mapping(format!(
                        "first column is missing, NULL or not {}",
                        $label
                    ))
                })
            }
        }
    };
}

first_column!(i64, get_i64_at, "an integer");
first_column!(i32, get_i32_at, "a 32-bit integer");
first_column!(f64, get_f64_at, "a number");
first_column!(bool, get_bool_at, "a boolean");
first_column!(String, get_string_at, "text");
first_column!(Vec<u8>, get_bytes_at, "a blob");
first_column!(NaiveDateTime, get_timestamp_at, "a timestamp");

impl<T: FromRow> FromRow for Option<T> {
    fn from_row(row: &Row) -> Result<Self, SqlConduitError> {
        if row.is_null_at(0) {
            Ok(None)
        } else {
            T::from_row(row).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    struct User {
        id: i64,
        name: String,
    }

    impl FromRow for User {
        fn from_row(row: &Row) -> Result<Self, SqlConduitError> {
            Ok(User {
                id: required(row, "id", Row::get_i64)?,
                name: required(row, "name", Row::get_string)?,
            })
        }
    }

    #[test]
    fn record_mapping_by_name() {
        let row = Row::new(
            vec!["ID".into(), "Name".into()],
            vec![RowValues::Int(3), RowValues::Text("ada".into())],
        );
        let user = User::from_row(&row).unwrap();
        assert_eq!((user.id, user.name.as_str()), (3, "ada"));
    }

    #[test]
    fn missing_column_is_mapping_error() {
        let row = Row::new(vec!["id".into()], vec![RowValues::Int(3)]);
        let err = User::from_row(&row).err().unwrap();
        assert!(matches!(err, SqlConduitError::Mapping(msg) if msg.contains("name")));
    }

    #[test]
    fn scalar_and_optional_first_column() {
        let row = Row::new(vec!["n".into()], vec![RowValues::Text("12".into())]);
        assert_eq!(i64::from_row(&row).unwrap(), 12);

        let null = Row::new(vec!["n".into()], vec![RowValues::Null]);
        assert_eq!(Option::<i64>::from_row(&null).unwrap(), None);
        assert!(i64::from_row(&null).is_err());
    }
}
