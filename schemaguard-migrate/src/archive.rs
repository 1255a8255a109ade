//! Archive naming shared by rollback and cleanup.
//!
//! An archived table or column is renamed to
//! `<prefix><original>_<YYYYMMDD_HHMMSS>`. The timestamp is the only record of
//! when the artifact was archived, so producing and parsing names must agree.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::ArchiveConfig;

/// Timestamp layout embedded in archive names.
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const TIMESTAMP_LEN: usize = 15;

/// Produces and parses archive names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveNaming {
    table_prefix: String,
    column_prefix: String,
}

/// A name parsed back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedName {
    /// Name before archival.
    pub original: String,
    /// When it was archived.
    pub archived_at: DateTime<Utc>,
}

impl ArchiveNaming {
    /// Create naming with explicit prefixes.
    pub fn new(table_prefix: impl Into<String>, column_prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: table_prefix.into(),
            column_prefix: column_prefix.into(),
        }
    }

    /// Create naming from configuration.
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(&config.table_prefix, &config.column_prefix)
    }

    /// Prefix of archived tables.
    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    /// Prefix of archived columns.
    pub fn column_prefix(&self) -> &str {
        &self.column_prefix
    }

    /// Format a timestamp the way archive names embed it.
    pub fn stamp(at: DateTime<Utc>) -> String {
        at.format(ARCHIVE_TIMESTAMP_FORMAT).to_string()
    }

    /// Archive name for a table.
    pub fn table_name(&self, table: &str, stamp: &str) -> String {
        format!("{}{}_{}", self.table_prefix, table, stamp)
    }

    /// Archive name for a column.
    pub fn column_name(&self, column: &str, stamp: &str) -> String {
        format!("{}{}_{}", self.column_prefix, column, stamp)
    }

    /// Whether a table name carries the archive prefix.
    pub fn is_archived_table(&self, name: &str) -> bool {
        name.starts_with(&self.table_prefix)
    }

    /// Whether a column name carries the archive prefix.
    pub fn is_archived_column(&self, name: &str) -> bool {
        name.starts_with(&self.column_prefix)
    }

    /// Parse an archived table name.
    pub fn parse_table(&self, name: &str) -> Option<ArchivedName> {
        parse(name, &self.table_prefix)
    }

    /// Parse an archived column name.
    pub fn parse_column(&self, name: &str) -> Option<ArchivedName> {
        parse(name, &self.column_prefix)
    }
}

impl Default for ArchiveNaming {
    fn default() -> Self {
        Self::from_config(&ArchiveConfig::default())
    }
}

fn parse(name: &str, prefix: &str) -> Option<ArchivedName> {
    let rest = name.strip_prefix(prefix)?;
    // "<original>_" plus the timestamp; the original may itself contain underscores.
    if rest.len() < TIMESTAMP_LEN + 2 || !rest.is_char_boundary(rest.len() - TIMESTAMP_LEN) {
        return None;
    }
    let (head, stamp) = rest.split_at(rest.len() - TIMESTAMP_LEN);
    let original = head.strip_suffix('_')?;
    if original.is_empty() {
        return None;
    }
    let archived_at = NaiveDateTime::parse_from_str(stamp, ARCHIVE_TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    Some(ArchivedName {
        original: original.to_string(),
        archived_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_table_name_round_trip() {
        let naming = ArchiveNaming::default();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 59).unwrap();
        let name = naming.table_name("order_items", &ArchiveNaming::stamp(at));
        assert_eq!(name, "_archived_order_items_20240309_140559");

        let parsed = naming.parse_table(&name).unwrap();
        assert_eq!(parsed.original, "order_items");
        assert_eq!(parsed.archived_at, at);
    }

    #[test]
    fn test_stamp_drops_subseconds() {
        let at = Utc::now();
        let naming = ArchiveNaming::default();
        let parsed = naming
            .parse_column(&naming.column_name("legacy_code", &ArchiveNaming::stamp(at)))
            .unwrap();
        assert_eq!(parsed.archived_at, at.with_nanosecond(0).unwrap());
    }

    #[test]
    fn test_rejects_malformed_names() {
        let naming = ArchiveNaming::default();
        assert!(naming.parse_table("customers").is_none());
        assert!(naming.parse_table("_archived_customers").is_none());
        assert!(naming.parse_table("_archived__20200101_000000").is_none());
        assert!(naming.parse_table("_archived_customers_20201301_000000").is_none());
        assert!(naming.parse_table("_archived_customers20200101_000000").is_none());
    }

    #[test]
    fn test_custom_prefixes() {
        let naming = ArchiveNaming::new("zz_tbl_", "zz_col_");
        assert!(naming.is_archived_table("zz_tbl_users_20200101_000000"));
        assert!(!naming.is_archived_column("zz_tbl_users_20200101_000000"));
        assert_eq!(
            naming.parse_column("zz_col_email_20200101_000000").unwrap().original,
            "email"
        );
    }
}
