//! Safe forward execution.
//!
//! Each run moves through
//! `Analyzing → BackingUp → Executing → Success`, or on a failed forward
//! operation `Executing → Restoring → Failed`. Backups are taken before anything
//! is mutated and the ledger is only written after the forward operation
//! succeeds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use schemaguard_adapter::{DatabaseAdapter, OperationKind};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analyzer::{DataLossEstimate, MigrationScriptAnalyzer, ScriptAnalysis};
use crate::backup::BackupSet;
use crate::config::TransactionPolicy;
use crate::error::{MigrateResult, MigrationError};
use crate::ledger::MigrationLedger;
use crate::migration::{Direction, Migration, MigrationSource};

/// Execution state of one migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Determining affected tables.
    Analyzing,
    /// Capturing backups.
    BackingUp,
    /// Running the forward operation.
    Executing,
    /// Forward operation and ledger update succeeded.
    Success,
    /// Replaying backups after a failure.
    Restoring,
    /// Forward operation failed.
    Failed,
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Analyzing => "analyzing",
            Self::BackingUp => "backing_up",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Restoring => "restoring",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Estimated cost of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationEstimate {
    /// What the operation does.
    pub description: String,
    /// Operation kind.
    pub kind: OperationKind,
    /// Table whose size drives the estimate.
    pub table: String,
    /// Estimated duration.
    pub duration: Duration,
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    /// Migration name.
    pub migration: String,
    /// Statements that would run.
    pub statements: Vec<String>,
    /// Analysis of the forward direction.
    pub analysis: ScriptAnalysis,
    /// Rows that would be lost.
    pub data_loss: DataLossEstimate,
    /// Per-operation duration estimates.
    pub estimates: Vec<OperationEstimate>,
}

impl ExecutionPlan {
    /// Sum of all duration estimates.
    pub fn estimated_duration(&self) -> Duration {
        self.estimates.iter().map(|e| e.duration).sum()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} statement(s)", self.statements.len()),
            format!("{} table(s)", self.analysis.affected_tables.len()),
        ];
        if !self.data_loss.is_empty() {
            parts.push(format!("{} row(s) at risk", self.data_loss.total_rows()));
        }
        format!("{}: {}", self.migration, parts.join(", "))
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Migration name.
    pub migration: String,
    /// Ledger batch.
    pub batch: u32,
    /// States passed through, in order.
    pub states: Vec<ExecutionState>,
    /// Tables backed up before execution.
    pub backed_up_tables: Vec<String>,
    /// Rows backed up before execution.
    pub backed_up_rows: u64,
    /// Whether the forward operation ran in a transaction.
    pub transactional: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

/// Outcome of [`SafeMigrationExecutor::run_safe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The migration ran.
    Applied(ExecutionReport),
    /// Pretend mode: nothing ran.
    Planned(ExecutionPlan),
}

/// Runs migrations with backup-before-mutate and restore-on-failure.
pub struct SafeMigrationExecutor {
    adapter: Arc<dyn DatabaseAdapter>,
    ledger: Arc<dyn MigrationLedger>,
    analyzer: MigrationScriptAnalyzer,
    transaction_policy: TransactionPolicy,
}

impl SafeMigrationExecutor {
    /// Create an executor.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>, ledger: Arc<dyn MigrationLedger>) -> Self {
        Self {
            adapter,
            ledger,
            analyzer: MigrationScriptAnalyzer::new(),
            transaction_policy: TransactionPolicy::default(),
        }
    }

    /// Set the transaction policy.
    pub fn with_transaction_policy(mut self, policy: TransactionPolicy) -> Self {
        self.transaction_policy = policy;
        self
    }

    /// The adapter in use.
    pub fn adapter(&self) -> &Arc<dyn DatabaseAdapter> {
        &self.adapter
    }

    /// Run a migration, or only plan it when `pretend` is set.
    pub async fn run_safe(
        &self,
        migration: &dyn Migration,
        batch: u32,
        pretend: bool,
    ) -> MigrateResult<RunOutcome> {
        if pretend {
            return Ok(RunOutcome::Planned(self.plan(migration).await?));
        }
        Ok(RunOutcome::Applied(self.run(migration, batch).await?))
    }

    /// Render the plan for a migration without side effects.
    pub async fn plan(&self, migration: &dyn Migration) -> MigrateResult<ExecutionPlan> {
        let source = migration.source(Direction::Up);
        let analysis = source.analyze(&self.analyzer);
        let data_loss = self
            .analyzer
            .estimate_data_loss(self.adapter.as_ref(), &analysis)
            .await?;
        let estimates = self.estimate(&source, &analysis).await?;

        Ok(ExecutionPlan {
            migration: migration.name().to_string(),
            statements: source.statements(self.adapter.as_ref()),
            analysis,
            data_loss,
            estimates,
        })
    }

    /// Run a migration.
    ///
    /// On a forward failure every backed-up table is restored (best effort) and
    /// the original error is returned as [`MigrationError::Execution`] with the
    /// per-table restoration outcomes attached.
    pub async fn run(&self, migration: &dyn Migration, batch: u32) -> MigrateResult<ExecutionReport> {
        let name = migration.name();
        let started = Instant::now();
        let mut states = Vec::new();

        enter(&mut states, name, ExecutionState::Analyzing);
        let analysis = migration.source(Direction::Up).analyze(&self.analyzer);

        enter(&mut states, name, ExecutionState::BackingUp);
        let backup = BackupSet::capture(self.adapter.as_ref(), &analysis.affected_tables).await?;

        enter(&mut states, name, ExecutionState::Executing);
        let transactional = self
            .transaction_policy
            .applies(self.adapter.supports_transactional_ddl());
        if transactional {
            self.adapter.begin_transaction().await?;
        }

        let forward = match migration.up(self.adapter.as_ref()).await {
            Ok(()) if transactional => self.adapter.commit().await.map_err(MigrationError::from),
            other => other,
        };

        if let Err(failure) = forward {
            error!(migration = %name, error = %failure, "Forward operation failed");
            if transactional {
                if let Err(e) = self.adapter.rollback().await {
                    warn!(migration = %name, error = %e, "Transaction rollback failed");
                }
            }

            enter(&mut states, name, ExecutionState::Restoring);
            let restoration = backup.restore(self.adapter.as_ref()).await;

            enter(&mut states, name, ExecutionState::Failed);
            return Err(MigrationError::Execution {
                migration: name.to_string(),
                source: Box::new(failure),
                restoration,
            });
        }

        self.ledger.log(name, batch).await?;
        enter(&mut states, name, ExecutionState::Success);

        Ok(ExecutionReport {
            migration: name.to_string(),
            batch,
            states,
            backed_up_tables: backup.tables(),
            backed_up_rows: backup.total_rows(),
            transactional,
            duration: started.elapsed(),
        })
    }

    async fn estimate(
        &self,
        source: &MigrationSource<'_>,
        analysis: &ScriptAnalysis,
    ) -> MigrateResult<Vec<OperationEstimate>> {
        // Typed operations are estimated one by one; scripts only by what the analyzer found.
        let targets: Vec<(String, OperationKind, String)> = match source {
            MigrationSource::Operations(ops) => ops
                .iter()
                .filter_map(|op| {
                    let kind = op.kind()?;
                    let table = op.primary_table()?;
                    Some((op.describe(), kind, table.to_string()))
                })
                .collect(),
            MigrationSource::Script(_) => {
                let mut targets = Vec::new();
                for drop in &analysis.dropped_columns {
                    targets.push((
                        format!("drop column {}.{}", drop.table, drop.column),
                        OperationKind::DropColumn,
                        drop.table.clone(),
                    ));
                }
                for table in &analysis.dropped_tables {
                    targets.push((format!("drop table {}", table), OperationKind::DropTable, table.clone()));
                }
                for rename in &analysis.renamed_tables {
                    targets.push((
                        format!("rename table {} to {}", rename.from, rename.to),
                        OperationKind::RenameTable,
                        rename.from.clone(),
                    ));
                }
                targets
            }
        };

        let mut estimates = Vec::with_capacity(targets.len());
        for (description, kind, table) in targets {
            let duration = self.adapter.estimate_operation_duration(kind, &table).await?;
            estimates.push(OperationEstimate {
                description,
                kind,
                table,
                duration,
            });
        }
        Ok(estimates)
    }
}

fn enter(states: &mut Vec<ExecutionState>, migration: &str, state: ExecutionState) {
    info!(migration = %migration, state = %state, "Migration state");
    states.push(state);
}
