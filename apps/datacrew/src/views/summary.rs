use std::fmt::Write as _;

use client_core::Session;
use shared::domain::Tab;

use super::{render_dataset_info, render_history, render_query_result, render_upload, View};

/// Compact layout: upload, query and a service-written summary.
pub struct SummaryView;

impl View for SummaryView {
    fn tabs(&self) -> &'static [Tab] {
        &[Tab::Upload, Tab::Overview, Tab::Query, Tab::Summary]
    }

    fn render_tab(&self, session: &Session, out: &mut String) {
        match session.active_tab {
            Tab::Overview => {
                if let Some(dataset) = &session.dataset {
                    render_dataset_info(&dataset.info, out);
                }
            }
            Tab::Query => {
                if session.busy.query {
                    let _ = writeln!(out, "Processing…");
                }
                match &session.query_result {
                    Some(response) => render_query_result(response, out),
                    None => {
                        let _ = writeln!(out, "Ask a question with `query <text>`.");
                    }
                }
                render_history(&session.history, out);
            }
            Tab::Summary => {
                if session.busy.summary {
                    let _ = writeln!(out, "Generating summary…");
                } else if session.summary.is_empty() {
                    let _ = writeln!(out, "Run `summary` to generate a dataset summary.");
                } else {
                    let _ = writeln!(out, "{}", session.summary);
                }
            }
            _ => render_upload(session, out),
        }
    }
}
