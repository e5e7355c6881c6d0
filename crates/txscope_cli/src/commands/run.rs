//! Run command implementation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use txscope_core::{
    create_transaction_with, resolve_executor, resolve_transaction, DriverError, IsolationLevel,
    Resolution, Scope, TxError, TxOptions, TxResult,
};
use txscope_memory::{MemoryConfig, MemoryDatabase};

/// Faults to arm before the unit of work starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Fail beginning the transaction.
    pub begin: bool,
    /// Fail the commit.
    pub commit: bool,
    /// Fail the rollback.
    pub rollback: bool,
}

/// Arguments of the run command.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Statements, in execution order.
    pub statements: Vec<String>,
    /// Initial database entries.
    pub seed: Vec<(String, String)>,
    /// Isolation level of the transaction.
    pub isolation: IsolationLevel,
    /// Whether the transaction is read-only.
    pub read_only: bool,
    /// Fail the unit of work after every statement ran.
    pub fail: bool,
    /// Faults to inject.
    pub faults: Faults,
}

/// Errors raised by the run command.
#[derive(Debug, Error)]
pub enum RunError {
    /// A seed entry was not of the form `key=value`.
    #[error("invalid seed {0:?}: expected key=value")]
    InvalidSeed(String),

    /// The script file could not be read.
    #[error("reading script {path}: {source}")]
    Script {
        /// Script path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A statement failed.
    #[error("statement {index} ({statement:?}) failed: {source}")]
    Statement {
        /// Zero-based position of the statement.
        index: usize,
        /// Statement text.
        statement: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },

    /// The unit of work was told to fail.
    #[error("unit of work failed on request")]
    Requested,

    /// Transaction coordination failed.
    #[error(transparent)]
    Tx(#[from] TxError),
}

/// Result of one statement.
#[derive(Debug, Serialize)]
pub struct StepReport {
    /// Statement text.
    pub statement: String,
    /// Rows written.
    pub rows_affected: u64,
    /// Rows returned.
    pub rows: Vec<Vec<String>>,
}

/// Result of a unit of work.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Isolation level used.
    pub isolation: String,
    /// Whether the transaction was read-only.
    pub read_only: bool,
    /// Statements that ran successfully.
    pub steps: Vec<StepReport>,
    /// Error that failed the unit of work, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How the transaction was resolved.
    pub resolution: &'static str,
    /// Error raised while resolving, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_error: Option<String>,
    /// Committed database contents afterwards.
    pub entries: BTreeMap<String, String>,
}

impl RunReport {
    /// Returns true if the unit of work succeeded and was committed.
    #[must_use]
    pub fn committed(&self) -> bool {
        self.resolution == "committed"
    }
}

/// Parses `key=value` seed entries.
pub fn parse_seed(entries: &[String]) -> Result<Vec<(String, String)>, RunError> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(RunError::InvalidSeed(entry.clone())),
        })
        .collect()
}

/// Reads statements from a file, one per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_script(path: &Path) -> Result<Vec<String>, RunError> {
    let text = std::fs::read_to_string(path).map_err(|source| RunError::Script {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Runs the run command.
pub fn run(args: &RunArgs, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = execute(args)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    if !report.committed() {
        return Err(format!("unit of work not committed ({})", report.resolution).into());
    }
    Ok(())
}

/// Executes the statements as one unit of work and reports the result.
///
/// # Errors
///
/// Only fails if the transaction cannot be begun. Failures of the unit of
/// work or its resolution are part of the report.
pub fn execute(args: &RunArgs) -> Result<RunReport, RunError> {
    let config = args
        .seed
        .iter()
        .fold(MemoryConfig::new(), |config, (k, v)| config.seed(k, v));
    let db = Arc::new(MemoryDatabase::with_config(config));

    if args.faults.begin {
        db.fail_next_begin();
    }
    if args.faults.commit {
        db.fail_next_commit();
    }
    if args.faults.rollback {
        db.fail_next_rollback();
    }

    let options = TxOptions::new()
        .isolation(args.isolation)
        .read_only(args.read_only);
    let (scope, tx) = create_transaction_with(Some(&Scope::root()), db.as_ref(), &options)?;
    info!(statements = args.statements.len(), "unit of work started");

    let mut steps = Vec::new();
    let outcome = unit_of_work(&scope, &db, args, &mut steps);
    let resolution = match &outcome {
        Ok(()) => resolve_transaction(tx.as_ref(), None),
        Err(err) => resolve_transaction(tx.as_ref(), Some(err)),
    };
    let (resolution, resolution_error) = describe(resolution);
    info!(resolution, "unit of work finished");

    Ok(RunReport {
        isolation: options.isolation.to_string(),
        read_only: options.read_only,
        steps,
        error: outcome.err().map(|err| err.to_string()),
        resolution,
        resolution_error,
        entries: db.entries().into_iter().collect(),
    })
}

fn unit_of_work(
    scope: &Scope,
    db: &Arc<MemoryDatabase>,
    args: &RunArgs,
    steps: &mut Vec<StepReport>,
) -> Result<(), RunError> {
    for (index, statement) in args.statements.iter().enumerate() {
        steps.push(step(scope, db, index, statement)?);
    }
    if args.fail {
        return Err(RunError::Requested);
    }
    Ok(())
}

fn step(
    scope: &Scope,
    db: &Arc<MemoryDatabase>,
    index: usize,
    statement: &str,
) -> Result<StepReport, RunError> {
    let (_, executor) = resolve_executor(scope, db.clone());
    debug!(index, statement, "executing");
    let result = executor
        .execute(statement)
        .map_err(|source| RunError::Statement {
            index,
            statement: statement.to_string(),
            source,
        })?;
    Ok(StepReport {
        statement: statement.to_string(),
        rows_affected: result.rows_affected,
        rows: result.rows,
    })
}

fn describe(resolution: TxResult<Resolution>) -> (&'static str, Option<String>) {
    match resolution {
        Ok(Resolution::Committed) => ("committed", None),
        Ok(Resolution::RolledBack { commit_error: None }) => ("rolled back", None),
        Ok(Resolution::RolledBack {
            commit_error: Some(err),
        }) => ("rolled back", Some(format!("commit failed: {err}"))),
        Err(err) => ("unknown", Some(err.to_string())),
    }
}

fn print_text_output(report: &RunReport) {
    println!("Unit of Work");
    println!("============");
    println!("Isolation:     {}", report.isolation);
    println!("Read only:     {}", report.read_only);
    println!();

    for step in &report.steps {
        println!("> {}  ({} affected)", step.statement, step.rows_affected);
        for row in &step.rows {
            println!("    {}", row.join(" = "));
        }
    }
    println!();

    if let Some(error) = &report.error {
        println!("Error:         {error}");
    }
    println!("Resolution:    {}", report.resolution);
    if let Some(error) = &report.resolution_error {
        println!("Resolution error: {error}");
    }
    println!();

    println!("Committed entries: {}", report.entries.len());
    for (key, value) in &report.entries {
        println!("  {key} = {value}");
    }
}
