use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::{
    PollPolicy, ServiceConfig, DEFAULT_ENDPOINT, ENV_API_KEY, ENV_ENDPOINT, ENV_MAX_POLL_ATTEMPTS,
    ENV_POLL_INTERVAL, ENV_REQUEST_TIMEOUT,
};
use crate::error::{AppError, Result};
use crate::excel;
use crate::extraction::{DocumentAiClient, ExtractionService};
use crate::processing::BatchOptions;
use crate::report;
use crate::session::ExpenseSession;
use crate::types::{BatchReport, DocumentEntry, DocumentType, LineItem, SummaryRecord};
use crate::upload::UploadedFile;

#[derive(Parser, Debug)]
#[command(
    name = "expense-assistant",
    version,
    about = "Extract receipts, hotel invoices and utility bills into CSV expense reports"
)]
pub struct Cli {
    /// Document AI API key
    #[arg(long, env = ENV_API_KEY, hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the extraction service
    #[arg(long, env = ENV_ENDPOINT, default_value = DEFAULT_ENDPOINT, global = true)]
    pub endpoint: String,

    /// Seconds to wait between status polls
    #[arg(long, env = ENV_POLL_INTERVAL, default_value_t = 3, global = true)]
    pub poll_interval: u64,

    /// Give up on a document after this many polls (0 = keep polling)
    #[arg(long, env = ENV_MAX_POLL_ATTEMPTS, default_value_t = 0, global = true)]
    pub max_poll_attempts: u32,

    /// Multiply the poll interval by this factor after every attempt
    #[arg(long, default_value_t = 1.0, global = true)]
    pub poll_backoff: f64,

    /// HTTP request timeout in seconds
    #[arg(long, env = ENV_REQUEST_TIMEOUT, default_value_t = 120, global = true)]
    pub request_timeout: u64,

    /// Documents to process at once
    #[arg(long, default_value_t = 1, global = true)]
    pub concurrency: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze documents and write the reports
    Analyze {
        /// Document as TYPE=PATH or TYPE=PATH::COMMENT (types: receipt, hotel-invoice, utility-bill)
        #[arg(short = 'd', long = "doc", required = true)]
        docs: Vec<DocumentArg>,
        /// Folder or file for the summary report (default: Downloads)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also write the summary as .xlsx
        #[arg(long)]
        xlsx: bool,
        /// Skip per-document line-item files
        #[arg(long)]
        no_line_items: bool,
    },
    /// Interactive session: add documents one by one, analyze, export
    Session {
        /// Folder for exported reports (default: Downloads)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// `TYPE=PATH[::COMMENT]` from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentArg {
    pub document_type: DocumentType,
    pub path: PathBuf,
    pub comment: Option<String>,
}

impl FromStr for DocumentArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once('=')
            .ok_or_else(|| format!("Expected TYPE=PATH, got '{}'", s))?;
        let document_type = kind.parse::<DocumentType>()?;
        let (path, comment) = match rest.split_once("::") {
            Some((path, comment)) => (path, Some(comment.trim().to_string())),
            None => (rest, None),
        };
        if path.trim().is_empty() {
            return Err("Missing file path".to_string());
        }
        Ok(Self {
            document_type,
            path: PathBuf::from(path.trim()),
            comment: comment.filter(|c| !c.is_empty()),
        })
    }
}

impl Cli {
    pub fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new(self.api_key.clone().unwrap_or_default())
            .with_endpoint(self.endpoint.clone());
        config.request_timeout = Duration::from_secs(self.request_timeout.max(1));
        config
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            policy: PollPolicy {
                interval: Duration::from_secs(self.poll_interval),
                backoff_factor: self.poll_backoff.max(1.0),
                ..PollPolicy::default()
            }
            .with_max_attempts(Some(self.max_poll_attempts)),
            concurrency: self.concurrency.max(1),
        }
    }
}

pub fn execute(cli: Cli) -> Result<()> {
    let service = DocumentAiClient::new(cli.service_config());
    let options = cli.batch_options();
    debug!(?options, "batch options");
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Analyze {
            docs,
            out: out_path,
            xlsx,
            no_line_items,
        } => {
            let mut session = ExpenseSession::new();
            for doc in docs {
                let file = UploadedFile::from_path(&doc.path)?;
                session.add(Some(file), doc.document_type, doc.comment)?;
            }
            let batch = session.analyze(&service, &options)?;
            write!(out, "{}", render_batch_report(&batch))?;
            write!(out, "{}", render_summary(session.summaries()))?;
            if session.summaries().is_empty() {
                return Err(AppError::ExtractionFailed(
                    "No documents could be processed.".to_string(),
                ));
            }

            let dir = companion_dir(out_path.as_deref());
            let dir = dir.as_deref();
            let path = report::write_summary_csv(session.summaries(), out_path.as_deref())?;
            writeln!(out, "Summary report: {}", path.display())?;
            if xlsx {
                let path = excel::write_summary_xlsx(session.summaries(), dir)?;
                writeln!(out, "Summary workbook: {}", path.display())?;
            }
            if !no_line_items {
                for table in session.line_item_tables() {
                    let path = report::write_line_items_csv(table, dir)?;
                    writeln!(out, "Line items: {}", path.display())?;
                }
            }
            Ok(())
        }
        Commands::Session { out: out_dir } => {
            let mut session = ExpenseSession::new();
            let stdin = std::io::stdin();
            run_shell(
                &mut session,
                &service,
                &options,
                stdin.lock(),
                &mut out,
                out_dir.as_deref(),
            )
        }
    }
}

/// Folder for the workbook and line-item files: `--out` itself, or the folder of the
/// `--out` file. `None` falls back to the default output folder.
pub fn companion_dir(out: Option<&Path>) -> Option<PathBuf> {
    let out = out?;
    if out.is_dir() {
        return Some(out.to_path_buf());
    }
    match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(parent.to_path_buf()),
        _ => Some(PathBuf::from(".")),
    }
}

const SHELL_HELP: &str = "\
Commands:
  add <receipt|hotel-invoice|utility-bill> <path> [comment...]
  remove <n>                 remove document n from the queue
  list                       show queued documents
  analyze                    extract fields from every queued document
  summary                    show the summary report
  items [n]                  show line items (all, or document n)
  export summary [path]      write the summary CSV
  export items <n> [path]    write line items of document n as CSV
  export xlsx [path]         write the summary as an Excel workbook
  reset                      start a new request
  help                       show this help
  quit                       leave the session
";

/// Line-oriented front end over an [`ExpenseSession`].
pub fn run_shell<S, R, W>(
    session: &mut ExpenseSession,
    service: &S,
    options: &BatchOptions,
    input: R,
    out: &mut W,
    out_dir: Option<&Path>,
) -> Result<()>
where
    S: ExtractionService,
    R: BufRead,
    W: Write,
{
    writeln!(out, "Easily submit receipts and bills for expense reimbursement.")?;
    writeln!(out, "Type 'help' for commands.")?;
    for line in input.lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        match command {
            "quit" | "exit" => break,
            "help" => write!(out, "{}", SHELL_HELP)?,
            other => {
                if let Err(e) = shell_command(session, service, options, other, &args, out, out_dir) {
                    writeln!(out, "⚠️ {}", e)?;
                }
            }
        }
    }
    Ok(())
}

fn parse_position(arg: Option<&&str>, count: usize) -> Result<usize> {
    let raw = arg.ok_or_else(|| AppError::Session("Missing document number.".to_string()))?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 && n <= count => Ok(n - 1),
        _ => Err(AppError::Session(format!("No document #{}.", raw))),
    }
}

fn shell_command<S: ExtractionService, W: Write>(
    session: &mut ExpenseSession,
    service: &S,
    options: &BatchOptions,
    command: &str,
    args: &[&str],
    out: &mut W,
    out_dir: Option<&Path>,
) -> Result<()> {
    match command {
        "add" => {
            let document_type = args
                .first()
                .ok_or_else(|| AppError::Session("Usage: add <type> <path> [comment]".to_string()))?
                .parse::<DocumentType>()
                .map_err(AppError::Session)?;
            let file = match args.get(1) {
                Some(path) => Some(UploadedFile::from_path(Path::new(path))?),
                None => None,
            };
            let comment = Some(args.iter().skip(2).copied().collect::<Vec<_>>().join(" "));
            if let Some(index) = session.add(file, document_type, comment)? {
                writeln!(out, "Added #{}.", index + 1)?;
            }
        }
        "remove" => {
            let index = parse_position(args.first(), session.entries().len())?;
            let removed = session.remove(index)?;
            writeln!(out, "Removed {}.", removed.file_name())?;
        }
        "list" => write!(out, "{}", render_queue(session.entries(), session.uploads_locked()))?,
        "analyze" => {
            writeln!(out, "Processing your expense documents...")?;
            let batch = session.analyze(service, options)?;
            write!(out, "{}", render_batch_report(&batch))?;
            write!(out, "{}", render_summary(session.summaries()))?;
        }
        "summary" => write!(out, "{}", render_summary(session.summaries()))?,
        "items" => {
            if let Some(arg) = args.first() {
                let index = parse_position(Some(arg), session.entries().len())?;
                let table = session.results().line_items_for(index).ok_or_else(|| {
                    AppError::Session(format!("Document #{} has no line items.", index + 1))
                })?;
                write!(out, "{}", render_line_items(&table.items))?;
            } else {
                for table in session.line_item_tables() {
                    writeln!(out, "{} – {}", table.file_name, table.document_type)?;
                    write!(out, "{}", render_line_items(&table.items))?;
                }
            }
        }
        "export" => {
            let target = |arg: Option<&&str>| {
                arg.map(|p| PathBuf::from(*p))
                    .or_else(|| out_dir.map(Path::to_path_buf))
            };
            match args.first().copied() {
                Some("summary") => {
                    require_results(session)?;
                    let path = report::write_summary_csv(session.summaries(), target(args.get(1)).as_deref())?;
                    writeln!(out, "⬇ Summary report: {}", path.display())?;
                }
                Some("items") => {
                    let index = parse_position(args.get(1), session.entries().len())?;
                    let table = session.results().line_items_for(index).ok_or_else(|| {
                        AppError::Session(format!("Document #{} has no line items.", index + 1))
                    })?;
                    let path = report::write_line_items_csv(table, target(args.get(2)).as_deref())?;
                    writeln!(out, "⬇ Line items: {}", path.display())?;
                }
                Some("xlsx") => {
                    require_results(session)?;
                    let path = excel::write_summary_xlsx(session.summaries(), target(args.get(1)).as_deref())?;
                    writeln!(out, "⬇ Summary workbook: {}", path.display())?;
                }
                _ => writeln!(out, "Usage: export summary|items <n>|xlsx [path]")?,
            }
        }
        "reset" => {
            session.reset();
            writeln!(out, "Started a new request.")?;
        }
        other => writeln!(out, "Unknown command '{}'. Type 'help'.", other)?,
    }
    Ok(())
}

fn require_results(session: &ExpenseSession) -> Result<()> {
    if session.summaries().is_empty() {
        return Err(AppError::Session("Nothing to export yet. Run 'analyze' first.".to_string()));
    }
    Ok(())
}

/// Plain-text table with columns padded to their widest cell.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            if col < widths.len() {
                widths[col] = widths[col].max(cell.chars().count());
            }
        }
    }
    let format_row = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut lines = vec![format_row(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

pub fn render_queue(entries: &[DocumentEntry], locked: bool) -> String {
    if entries.is_empty() {
        return "Begin by uploading your first expense document.\n".to_string();
    }
    let mut text = String::from("Expenses you've added:\n");
    for (i, entry) in entries.iter().enumerate() {
        text.push_str(&format!(
            "{} {}. {} – {}\n",
            entry.status.icon(),
            i + 1,
            entry.file_name(),
            entry.document_type
        ));
        if let Some(comment) = &entry.comment {
            text.push_str(&format!("   💬 {}\n", comment));
        }
        if let Some(error) = &entry.error {
            text.push_str(&format!("   ⚠️ {}\n", error));
        }
    }
    if locked {
        text.push_str("Upload disabled. Use 'reset' to begin again.\n");
    }
    text
}

pub fn render_summary(records: &[SummaryRecord]) -> String {
    if records.is_empty() {
        return "No results yet.\n".to_string();
    }
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.file_name.clone(),
                r.document_type.to_string(),
                r.primary_entity.clone(),
                r.total_amount.clone(),
                r.currency.clone(),
                r.comment.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&report::SUMMARY_HEADERS, &rows)
}

pub fn render_line_items(items: &[LineItem]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|i| {
            vec![
                i.description.clone(),
                i.quantity.clone(),
                i.unit_price.clone(),
                i.amount.clone(),
            ]
        })
        .collect();
    render_table(&report::LINE_ITEM_HEADERS, &rows)
}

pub fn render_batch_report(report: &BatchReport) -> String {
    let mut text = format!(
        "Processed {} of {} document(s) in {:.1}s.\n",
        report.processed,
        report.total(),
        report.elapsed_ms as f64 / 1000.0
    );
    for failure in &report.failures {
        text.push_str(&format!("⚠️ {}\n", failure.error));
    }
    text
}
