//! Static analysis of migrations.
//!
//! Two paths produce the same [`ScriptAnalysis`]:
//!
//! - [`MigrationScriptAnalyzer::analyze_script`] pattern-matches SQL text for four
//!   shapes: create/alter a table, drop a table, drop a column, rename a table.
//!   Nothing is executed.
//! - [`MigrationScriptAnalyzer::analyze_operations`] reads a typed operation
//!   list and is exact.
//!
//! ## Known limitation of the textual path
//!
//! A `DROP COLUMN` is attributed to the nearest `ALTER TABLE` that precedes it
//! in the text. Comments, string literals and unusual formatting are not
//! understood, so a commented-out `ALTER TABLE` between the real one and the
//! column drop steals the attribution. Migrations that need exact analysis
//! should be written as [`SchemaOperation`] lists.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use schemaguard_adapter::{AdapterResult, DatabaseAdapter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::operation::SchemaOperation;

const IDENT: &str = r#"(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?(\w+)[`"\]]?"#;

static CREATE_OR_ALTER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(
        r"(?i)\b(?:CREATE\s+(?:TEMPORARY\s+|TEMP\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?|ALTER\s+TABLE\s+(?:ONLY\s+)?(?:IF\s+EXISTS\s+)?){IDENT}"
    ))
});

static ALTER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(
        r"(?i)\bALTER\s+TABLE\s+(?:ONLY\s+)?(?:IF\s+EXISTS\s+)?{IDENT}"
    ))
});

static DROP_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(r"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?{IDENT}"))
});

static DROP_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(r"(?i)\bDROP\s+COLUMN\s+(?:IF\s+EXISTS\s+)?{IDENT}"))
});

static RENAME_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(&format!(
        r"(?i)\b(?:ALTER\s+TABLE\s+{IDENT}\s+RENAME\s+TO|RENAME\s+TABLE\s+{IDENT}\s+TO)\s+{IDENT}"
    ))
});

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("analyzer patterns are valid")
}

/// A column drop attributed to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDrop {
    /// Table the column belongs to.
    pub table: String,
    /// Dropped column.
    pub column: String,
}

/// A table rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRename {
    /// Old name.
    pub from: String,
    /// New name.
    pub to: String,
}

/// Tables and columns a migration touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    /// Every touched table, de-duplicated, in order of first appearance.
    pub affected_tables: Vec<String>,
    /// Dropped tables.
    pub dropped_tables: Vec<String>,
    /// Dropped columns.
    pub dropped_columns: Vec<ColumnDrop>,
    /// Renamed tables.
    pub renamed_tables: Vec<TableRename>,
    /// Column drops with no preceding `ALTER TABLE` to attribute them to.
    pub unattributed_columns: Vec<String>,
}

impl ScriptAnalysis {
    /// Whether the migration drops any table or column.
    pub fn is_destructive(&self) -> bool {
        !self.dropped_tables.is_empty() || !self.dropped_columns.is_empty()
    }

    /// Whether `table` is touched.
    pub fn touches(&self, table: &str) -> bool {
        self.affected_tables.iter().any(|t| t == table)
    }

    fn add_table(&mut self, table: &str) {
        if !self.touches(table) {
            self.affected_tables.push(table.to_string());
        }
    }
}

/// Rows that would be lost by one drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLossItem {
    /// Affected table.
    pub table: String,
    /// Dropped column, or `None` for a table drop.
    pub column: Option<String>,
    /// Rows holding data that would be lost.
    pub rows: u64,
}

/// Data-loss estimate for a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLossEstimate {
    /// One entry per drop whose target exists.
    pub items: Vec<DataLossItem>,
}

impl DataLossEstimate {
    /// Total rows at risk.
    pub fn total_rows(&self) -> u64 {
        self.items.iter().map(|i| i.rows).sum()
    }

    /// Whether no data is at risk.
    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }
}

/// Determines what a migration touches without executing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationScriptAnalyzer;

impl MigrationScriptAnalyzer {
    /// Create an analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Analyze SQL text.
    pub fn analyze_script(&self, script: &str) -> ScriptAnalysis {
        let mut analysis = ScriptAnalysis::default();

        // (position, table) from every shape, so affected tables follow text order.
        let mut mentions: Vec<(usize, String)> = Vec::new();

        for caps in CREATE_OR_ALTER.captures_iter(script) {
            if let Some(m) = caps.get(1) {
                mentions.push((m.start(), m.as_str().to_string()));
            }
        }

        for caps in DROP_TABLE.captures_iter(script) {
            if let Some(m) = caps.get(1) {
                mentions.push((m.start(), m.as_str().to_string()));
                if !analysis.dropped_tables.iter().any(|t| t == m.as_str()) {
                    analysis.dropped_tables.push(m.as_str().to_string());
                }
            }
        }

        for caps in RENAME_TABLE.captures_iter(script) {
            let from = caps.get(1).or_else(|| caps.get(2));
            if let (Some(from), Some(to)) = (from, caps.get(3)) {
                mentions.push((from.start(), from.as_str().to_string()));
                mentions.push((to.start(), to.as_str().to_string()));
                analysis.renamed_tables.push(TableRename {
                    from: from.as_str().to_string(),
                    to: to.as_str().to_string(),
                });
            }
        }

        let alters: Vec<(usize, &str)> = ALTER
            .captures_iter(script)
            .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str())))
            .collect();

        for caps in DROP_COLUMN.captures_iter(script) {
            let (Some(whole), Some(column)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            // Backward scan: nearest ALTER TABLE before the drop.
            let owner = alters
                .iter()
                .rev()
                .find(|(pos, _)| *pos < whole.start())
                .map(|(_, table)| *table);
            match owner {
                Some(table) => {
                    let drop = ColumnDrop {
                        table: table.to_string(),
                        column: column.as_str().to_string(),
                    };
                    if !analysis.dropped_columns.contains(&drop) {
                        analysis.dropped_columns.push(drop);
                    }
                }
                None => analysis
                    .unattributed_columns
                    .push(column.as_str().to_string()),
            }
        }

        mentions.sort_by_key(|(pos, _)| *pos);
        for (_, table) in &mentions {
            analysis.add_table(table);
        }

        debug!(
            tables = analysis.affected_tables.len(),
            dropped_tables = analysis.dropped_tables.len(),
            dropped_columns = analysis.dropped_columns.len(),
            "Analyzed script"
        );
        analysis
    }

    /// Analyze a typed operation list.
    pub fn analyze_operations(&self, operations: &[SchemaOperation]) -> ScriptAnalysis {
        let mut analysis = ScriptAnalysis::default();
        for op in operations {
            for table in op.tables() {
                analysis.add_table(table);
            }
            match op {
                SchemaOperation::DropTable { table } => {
                    if !analysis.dropped_tables.contains(table) {
                        analysis.dropped_tables.push(table.clone());
                    }
                }
                SchemaOperation::DropColumn { table, column } => {
                    let drop = ColumnDrop {
                        table: table.clone(),
                        column: column.clone(),
                    };
                    if !analysis.dropped_columns.contains(&drop) {
                        analysis.dropped_columns.push(drop);
                    }
                }
                SchemaOperation::RenameTable { from, to } => {
                    analysis.renamed_tables.push(TableRename {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                _ => {}
            }
        }
        analysis
    }

    /// Count the rows each drop would destroy on the live database.
    ///
    /// Table drops count all rows; column drops count rows where the column is
    /// not NULL. Drops of tables or columns that do not exist are left out.
    pub async fn estimate_data_loss(
        &self,
        adapter: &dyn DatabaseAdapter,
        analysis: &ScriptAnalysis,
    ) -> AdapterResult<DataLossEstimate> {
        let existing: BTreeSet<String> = adapter.get_all_tables().await?.into_iter().collect();
        let mut estimate = DataLossEstimate::default();

        for table in &analysis.dropped_tables {
            if existing.contains(table) {
                estimate.items.push(DataLossItem {
                    table: table.clone(),
                    column: None,
                    rows: adapter.get_table_row_count(table).await?,
                });
            }
        }

        for drop in &analysis.dropped_columns {
            if existing.contains(&drop.table) && adapter.has_column(&drop.table, &drop.column).await? {
                estimate.items.push(DataLossItem {
                    table: drop.table.clone(),
                    column: Some(drop.column.clone()),
                    rows: adapter.count_non_null(&drop.table, &drop.column).await?,
                });
            }
        }

        Ok(estimate)
    }
}
