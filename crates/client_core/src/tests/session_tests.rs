use super::*;
use chrono::TimeZone;
use serde_json::json;

fn record(query: &str) -> QueryRecord {
    QueryRecord {
        query: query.to_string(),
        sql: None,
        result: None,
        ok: false,
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

fn dataset(id: &str) -> ActiveDataset {
    ActiveDataset {
        id: DatasetId::new(id),
        info: serde_json::from_value(json!({"shape": [3, 2], "columns": ["a", "b"]}))
            .expect("info"),
    }
}

#[test]
fn history_keeps_most_recent_entries_first() {
    let mut history = QueryHistory::new(8);
    for i in 0..10 {
        history.push(record(&format!("q{i}")));
    }

    assert_eq!(history.len(), 8);
    let queries: Vec<_> = history.iter().map(|r| r.query.as_str()).collect();
    assert_eq!(queries, ["q9", "q8", "q7", "q6", "q5", "q4", "q3", "q2"]);
}

#[test]
fn history_capacity_never_drops_below_one() {
    let mut history = QueryHistory::new(0);
    history.push(record("a"));
    history.push(record("b"));
    assert_eq!(history.capacity(), 1);
    assert_eq!(history.get(0).map(|r| r.query.as_str()), Some("b"));
}

#[test]
fn record_marks_ok_only_with_rows_and_no_error() {
    let at = Utc::now();
    let ok: QueryResponse = serde_json::from_value(json!({
        "sql_query": "SELECT 1",
        "result": {"data": [{"x": 1}], "columns": ["x"], "row_count": 1}
    }))
    .expect("decode");
    assert!(QueryRecord::from_response("one", &ok, at).ok);

    let failed: QueryResponse = serde_json::from_value(json!({
        "sql_query": "SELECT x",
        "result": {"data": [], "error": "SQL execution error"}
    }))
    .expect("decode");
    let rec = QueryRecord::from_response("bad", &failed, at);
    assert!(!rec.ok);
    assert_eq!(rec.sql.as_deref(), Some("SELECT x"));
}

#[test]
fn busy_flags_track_each_operation_independently() {
    let mut busy = BusyFlags::default();
    assert!(!busy.any());

    busy.set(Operation::Analyze, true);
    assert!(busy.get(Operation::Analyze));
    assert!(!busy.get(Operation::Visualize));
    assert!(busy.any());

    busy.set(Operation::Analyze, false);
    assert_eq!(busy, BusyFlags::default());
}

#[test]
fn gated_tabs_need_a_dataset() {
    let mut session = Session::default();
    assert!(session.can_navigate(Tab::Upload));
    for tab in [Tab::Overview, Tab::Query, Tab::Visualize, Tab::Summary] {
        assert!(!session.can_navigate(tab), "{tab:?} should be gated");
    }

    session.dataset = Some(dataset("abc"));
    assert!(Tab::ALL.iter().all(|tab| session.can_navigate(*tab)));
}

#[test]
fn activating_a_dataset_clears_dependents_but_keeps_history() {
    let mut session = Session::default();
    session.analysis = "old analysis".into();
    session.query = "average sales".into();
    session.last_error = Some("Upload failed".into());
    session.history.push(record("earlier"));

    session.activate_dataset(dataset("next"));

    assert_eq!(session.active_tab, Tab::Overview);
    assert!(session.analysis.is_empty());
    assert!(session.last_error.is_none());
    assert_eq!(session.query, "average sales");
    assert_eq!(session.history.len(), 1);
}

#[test]
fn query_failure_clears_the_previous_result() {
    let mut session = Session::default();
    session.query_result = Some(QueryResponse::default());
    session.record_failure(Operation::Query, "Query error".into());
    assert!(session.query_result.is_none());
    assert_eq!(session.last_error.as_deref(), Some("Query error"));

    session.analysis = "kept".into();
    session.record_failure(Operation::Analyze, "Analysis failed".into());
    assert_eq!(session.analysis, "kept");
}

#[test]
fn reset_returns_to_initial_state_with_same_capacity() {
    let mut session = Session::new(3);
    session.dataset = Some(dataset("abc"));
    session.history.push(record("q"));
    session.busy.set(Operation::Cleanup, true);

    session.reset();
    assert_eq!(session, Session::new(3));
}
