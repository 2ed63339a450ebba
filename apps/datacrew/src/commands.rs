//! Shell commands typed at the `datacrew>` prompt.

use std::path::PathBuf;

use shared::domain::Tab;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(PathBuf),
    Tab(Tab),
    Analyze,
    Visualize,
    Summary,
    /// Submit `text`, or the current query input when empty.
    Query(Option<String>),
    /// 1-based position in the history list.
    Recall(usize),
    History,
    Remove,
    SaveCharts(Option<PathBuf>),
    Dismiss,
    Show,
    Wait,
    Health,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error("invalid argument for '{command}': {value}")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

pub const HELP: &str = "\
commands:
  upload <path>        upload a CSV/TSV/XLSX/SQL file
  tab <name>           switch to upload, overview, query, visualize or summary
  analyze              re-run the dataset analysis
  visualize            regenerate charts
  summary              fetch the dataset summary
  query [text]         ask a question in plain language
  recall <n>           copy history entry n back into the query input
  history              list recent queries
  remove               drop the dataset on the service and reset
  save-charts [dir]    write chart images to disk
  dismiss              clear the error banner
  wait                 wait for background analysis and charts
  show                 render the current view
  health               ping the service
  status               print the service status
  quit                 exit";

/// Returns `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "upload" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument {
                    command: "upload",
                    what: "a file path",
                });
            }
            Command::Upload(PathBuf::from(rest))
        }
        "tab" => {
            let tab = Tab::parse(rest).ok_or_else(|| ParseError::InvalidArgument {
                command: "tab",
                value: rest.to_string(),
            })?;
            Command::Tab(tab)
        }
        "analyze" | "analyse" => Command::Analyze,
        "visualize" | "charts" => Command::Visualize,
        "summary" => Command::Summary,
        "query" | "ask" => Command::Query((!rest.is_empty()).then(|| rest.to_string())),
        "recall" => {
            let position = rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| ParseError::InvalidArgument {
                    command: "recall",
                    value: rest.to_string(),
                })?;
            Command::Recall(position)
        }
        "history" => Command::History,
        "remove" | "cleanup" => Command::Remove,
        "save-charts" => Command::SaveCharts((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "dismiss" => Command::Dismiss,
        "show" => Command::Show,
        "wait" => Command::Wait,
        "health" => Command::Health,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}
