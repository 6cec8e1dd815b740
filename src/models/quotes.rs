use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

use crate::{
    constants::{ISO_NAIVE_DATETIME, SQLITE_DATETIME},
    error::{QuoteError, QuoteResult},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub created_at: OffsetDateTime,
}

/// A `quotes` row as stored, before the timestamp is decoded.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct QuoteRow {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub created_at: String,
}

impl QuoteRow {
    /// Decodes the row, failing with [`QuoteError::CorruptRow`] when `created_at` is in no
    /// known format.
    pub fn into_quote(self) -> QuoteResult<Quote> {
        match parse_timestamp(&self.created_at) {
            Some(created_at) => Ok(Quote {
                id: self.id,
                text: self.text,
                author: self.author,
                created_at,
            }),
            None => Err(QuoteError::CorruptRow {
                id: self.id,
                value: self.created_at,
            }),
        }
    }
}

/// Parses a stored timestamp.
///
/// Rows written by older revisions may carry any of these, so all are accepted:
/// `YYYY-MM-DD HH:MM:SS` (sqlite's `CURRENT_TIMESTAMP`), RFC 3339 with or without
/// fractional seconds, and offset-less `YYYY-MM-DDTHH:MM:SS`. Values without an
/// offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();

    if let Ok(dt) = PrimitiveDateTime::parse(value, SQLITE_DATETIME) {
        return Some(dt.assume_utc());
    }

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(dt);
    }

    PrimitiveDateTime::parse(value, ISO_NAIVE_DATETIME)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_sqlite_current_timestamp() {
        assert_eq!(
            parse_timestamp("2024-03-01 12:34:56"),
            Some(datetime!(2024-03-01 12:34:56 UTC))
        );
    }

    #[test]
    fn parses_rfc3339_variants() {
        assert_eq!(
            parse_timestamp("2024-03-01T12:34:56+02:00"),
            Some(datetime!(2024-03-01 12:34:56 +2))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T12:34:56.123456789Z"),
            Some(datetime!(2024-03-01 12:34:56.123456789 UTC))
        );
    }

    #[test]
    fn parses_naive_iso() {
        assert_eq!(
            parse_timestamp("2024-03-01T12:34:56"),
            Some(datetime!(2024-03-01 12:34:56 UTC))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
