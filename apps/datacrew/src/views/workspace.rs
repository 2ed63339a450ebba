use std::fmt::Write as _;

use client_core::Session;
use shared::domain::Tab;

use super::{
    render_dataset_info, render_history, render_preview, render_query_result, render_upload, View,
};

/// Upload, overview with analysis, query workspace with history, and charts.
pub struct WorkspaceView;

impl View for WorkspaceView {
    fn tabs(&self) -> &'static [Tab] {
        &[Tab::Upload, Tab::Overview, Tab::Query, Tab::Visualize]
    }

    fn render_tab(&self, session: &Session, out: &mut String) {
        match session.active_tab {
            Tab::Overview => render_overview(session, out),
            Tab::Query => render_query(session, out),
            Tab::Visualize => render_charts(session, out),
            _ => render_upload(session, out),
        }
    }
}

fn render_overview(session: &Session, out: &mut String) {
    let Some(dataset) = &session.dataset else {
        return;
    };
    render_dataset_info(&dataset.info, out);
    let _ = writeln!(out);

    let status = if session.busy.analyze { " (Analyzing…)" } else { "" };
    let _ = writeln!(out, "AI Analysis{status}");
    if session.analysis.is_empty() {
        let _ = writeln!(out, "  No analysis yet.");
    } else {
        for line in session.analysis.lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    let _ = writeln!(out);
    render_preview(&dataset.info, out);
}

fn render_query(session: &Session, out: &mut String) {
    let query = if session.query.is_empty() {
        "(empty)"
    } else {
        session.query.as_str()
    };
    let _ = writeln!(out, "Query: {query}");
    if session.busy.query {
        let _ = writeln!(out, "Processing…");
    }
    if let Some(response) = &session.query_result {
        render_query_result(response, out);
    }
    let _ = writeln!(out);
    render_history(&session.history, out);
}

fn render_charts(session: &Session, out: &mut String) {
    if session.visualizations.is_empty() {
        let message = if session.busy.visualize {
            "Generating visualizations…"
        } else {
            "No visualizations to show."
        };
        let _ = writeln!(out, "{message}");
        return;
    }
    for (position, viz) in session.visualizations.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", position + 1, viz.title);
        if !viz.description.is_empty() {
            let _ = writeln!(out, "   {}", viz.description);
        }
        let _ = writeln!(
            out,
            "   image: {} base64 chars (save-charts to write PNGs)",
            viz.image.len()
        );
    }
}
