//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use pageview_core::{ExportFormat, FieldPath, FilterValue, SortDirection, SortState, ViewType};
use pageview_engine::ActionScope;

#[derive(Parser, Debug)]
#[command(
    name = "pageview",
    version,
    about = "Render, export and act on declarative page descriptors"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a page descriptor and list its views.
    Validate {
        /// Page descriptor (JSON).
        #[arg(value_name = "PAGE")]
        page: PathBuf,
    },

    /// Print the session snapshot for a toolbar state.
    Render(SessionArgs),

    /// Print the stat cards for a toolbar state.
    Stats(SessionArgs),

    /// Export the unpaginated result of a toolbar state.
    Export {
        #[command(flatten)]
        session: SessionArgs,

        #[arg(long, value_parser = parse_export_format)]
        format: ExportFormat,

        /// Output file. Defaults to the page's export filename.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Invoke an action and print its outcome.
    Action {
        #[command(flatten)]
        session: SessionArgs,

        /// Action id.
        #[arg(long = "id")]
        action: String,

        #[arg(long, value_enum, default_value = "bulk")]
        scope: ScopeArg,

        /// Target records. Bulk actions select them first.
        #[arg(long, value_delimiter = ',')]
        records: Vec<String>,

        /// Answer yes to confirmation prompts.
        #[arg(long, short)]
        yes: bool,
    },
}

/// Descriptor, fixture and toolbar state for one session.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Page descriptor (JSON).
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Record fixture: a JSON array of records.
    #[arg(long = "data", value_name = "FILE")]
    pub data: PathBuf,

    /// Aggregate payload returned with every page (JSON object).
    #[arg(long = "aggregates", value_name = "FILE")]
    pub aggregates: Option<PathBuf>,

    /// Engine config (TOML). Defaults to the platform config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Roles held by the user. Without roles every permission is granted.
    #[arg(long, value_delimiter = ',')]
    pub roles: Option<Vec<String>>,

    #[arg(long, value_parser = parse_view_type)]
    pub view: Option<ViewType>,

    #[arg(long)]
    pub search: Option<String>,

    /// Filter as FIELD=VALUE, FIELD=A,B or FIELD=FROM..TO.
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, FilterValue)>,

    /// Sort as FIELD or FIELD:desc.
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortState>,

    /// Zero-based page index.
    #[arg(long, default_value_t = 0)]
    pub page_index: usize,

    #[arg(long)]
    pub page_size: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ScopeArg {
    Primary,
    Row,
    Bulk,
}

impl From<ScopeArg> for ActionScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Primary => ActionScope::Primary,
            ScopeArg::Row => ActionScope::Row,
            ScopeArg::Bulk => ActionScope::Bulk,
        }
    }
}

// =============================================================================
// Value parsers
// =============================================================================

pub fn parse_filter(raw: &str) -> Result<(String, FilterValue), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    if field.is_empty() {
        return Err(format!("missing field in '{raw}'"));
    }

    let value = if let Some((from, to)) = value.split_once("..") {
        FilterValue::Range {
            from: non_empty(from),
            to: non_empty(to),
        }
    } else if value.contains(',') {
        FilterValue::Many(value.split(',').map(str::to_string).collect())
    } else {
        FilterValue::Single(value.to_string())
    };
    Ok((field.to_string(), value))
}

pub fn parse_sort(raw: &str) -> Result<SortState, String> {
    let (field, direction) = match raw.rsplit_once(':') {
        Some((field, "asc")) => (field, SortDirection::Asc),
        Some((field, "desc")) => (field, SortDirection::Desc),
        Some((_, other)) => return Err(format!("unknown sort direction '{other}'")),
        None => (raw, SortDirection::Asc),
    };
    let field = FieldPath::parse(field).map_err(|e| e.to_string())?;
    Ok(SortState { field, direction })
}

pub fn parse_view_type(raw: &str) -> Result<ViewType, String> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| format!("unknown view type '{raw}'"))
}

pub fn parse_export_format(raw: &str) -> Result<ExportFormat, String> {
    serde_json::from_value(Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| format!("unknown export format '{raw}'"))
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}
