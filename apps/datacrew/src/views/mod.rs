//! Text presentations of a [`Session`]. Both views read the same session;
//! they differ only in which tabs they offer and how each tab is laid out.

use std::fmt::Write as _;

use client_core::{QueryHistory, Session, UploadFollowups};
use serde_json::Value;
use shared::{
    domain::Tab,
    protocol::{DatasetInfo, QueryResponse, Row},
};

use crate::config::ViewKind;

mod summary;
mod workspace;

pub use summary::SummaryView;
pub use workspace::WorkspaceView;

const PREVIEW_ROWS: usize = 5;
const PREVIEW_CELL_WIDTH: usize = 60;
const RESULT_ROWS: usize = 200;

pub trait View: Send + Sync {
    fn tabs(&self) -> &'static [Tab];

    fn render_tab(&self, session: &Session, out: &mut String);

    fn offers(&self, tab: Tab) -> bool {
        self.tabs().contains(&tab)
    }

    /// Only the requests whose results this view can show are started after an upload.
    fn upload_followups(&self) -> UploadFollowups {
        UploadFollowups {
            analysis: self.offers(Tab::Overview),
            visualizations: self.offers(Tab::Visualize),
        }
    }

    fn render(&self, session: &Session) -> String {
        let mut out = String::new();
        render_header(&mut out);
        if let Some(error) = &session.last_error {
            let _ = writeln!(out, "!! {error}");
        }
        render_tab_bar(self.tabs(), session, &mut out);
        if self.offers(session.active_tab) {
            self.render_tab(session, &mut out);
        } else {
            let _ = writeln!(
                out,
                "The {} tab is not part of this view.",
                session.active_tab.label()
            );
        }
        out
    }
}

pub fn select(kind: ViewKind) -> Box<dyn View> {
    match kind {
        ViewKind::Workspace => Box::new(WorkspaceView),
        ViewKind::Summary => Box::new(SummaryView),
    }
}

fn render_header(out: &mut String) {
    let _ = writeln!(out, "DataCrew.ai");
}

fn render_tab_bar(tabs: &[Tab], session: &Session, out: &mut String) {
    let labels: Vec<String> = tabs
        .iter()
        .map(|tab| {
            if *tab == session.active_tab {
                format!("[{}]", tab.label())
            } else if session.can_navigate(*tab) {
                format!(" {} ", tab.label())
            } else {
                format!("({})", tab.label().to_ascii_lowercase())
            }
        })
        .collect();
    let mut bar = labels.join(" ");
    if session.has_dataset() {
        bar.push_str(if session.busy.cleanup {
            "   Cleaning…"
        } else {
            "   remove: drop dataset"
        });
    }
    let _ = writeln!(out, "{bar}");
    let _ = writeln!(out, "{}", "-".repeat(bar.chars().count().max(20)));
}

fn render_upload(session: &Session, out: &mut String) {
    let _ = writeln!(out, "Upload a dataset with `upload <path>`.");
    let _ = writeln!(out, "Accepted: CSV, TSV, XLSX, SQL");
    if session.busy.upload {
        let _ = writeln!(out, "Uploading…");
    }
    if let Some(file) = &session.selected_file {
        let _ = writeln!(out, "Selected: {} ({} bytes)", file.filename, file.size_bytes);
    }
}

fn render_dataset_info(info: &DatasetInfo, out: &mut String) {
    let _ = writeln!(out, "Dataset Info");
    let _ = writeln!(
        out,
        "  Rows: {}  Columns: {}  Numeric: {}  Categorical: {}",
        info.row_count(),
        info.column_count(),
        info.numeric_columns.len(),
        info.categorical_columns.len()
    );
    let _ = writeln!(out, "  Columns: {}", info.columns.join(", "));
    if let Some(missing) = &info.missing_values {
        let gaps: Vec<String> = missing
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(column, count)| format!("{column}={count}"))
            .collect();
        if !gaps.is_empty() {
            let _ = writeln!(out, "  Missing values: {}", gaps.join(", "));
        }
    }
}

fn render_preview(info: &DatasetInfo, out: &mut String) {
    let _ = writeln!(out, "Preview (first {PREVIEW_ROWS} rows)");
    out.push_str(&format_table(
        &info.columns,
        &info.preview,
        PREVIEW_ROWS,
        PREVIEW_CELL_WIDTH,
    ));
}

fn render_query_result(response: &QueryResponse, out: &mut String) {
    if let Some(sql) = &response.sql_query {
        let _ = writeln!(out, "SQL Generated\n  {sql}");
    }
    if let Some(validation) = response.validation_text() {
        let _ = writeln!(out, "Validation\n  {}", validation.replace('\n', "\n  "));
    }
    if let Some(result) = &response.result {
        if let Some(rows) = &result.data {
            let count = result.row_count.unwrap_or(rows.len() as u64);
            let _ = writeln!(out, "Results ({count} rows)");
            out.push_str(&format_table(&result.columns, rows, RESULT_ROWS, usize::MAX));
        }
        if let Some(error) = &result.error {
            let _ = writeln!(out, "!! {error}");
        }
    }
}

fn render_history(history: &QueryHistory, out: &mut String) {
    let _ = writeln!(out, "Query History");
    if history.is_empty() {
        let _ = writeln!(out, "  No queries yet.");
        return;
    }
    for (position, record) in history.iter().enumerate() {
        let status = if record.ok { "OK" } else { "WARN" };
        let _ = writeln!(
            out,
            "  {}. [{status}] {} ({})",
            position + 1,
            record.query,
            record.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(sql) = &record.sql {
            let _ = writeln!(out, "     {sql}");
        }
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Plain fixed-width table, at most `row_limit` rows, cells cut at `max_cell` chars.
fn format_table(columns: &[String], rows: &[Row], row_limit: usize, max_cell: usize) -> String {
    if columns.is_empty() {
        return "  (no columns)\n".to_string();
    }
    let cells: Vec<Vec<String>> = rows
        .iter()
        .take(row_limit)
        .map(|row| {
            columns
                .iter()
                .map(|column| truncate(cell_text(row.get(column)), max_cell))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let line = |values: &[String]| -> String {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}", width = *width))
            .collect();
        format!("  | {} |\n", padded.join(" | "))
    };

    let mut table = line(columns);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    table.push_str(&line(&rule));
    for row in &cells {
        table.push_str(&line(row));
    }
    table
}
