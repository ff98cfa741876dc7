use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{Value, json};
use tieout::executor::{HttpExecutor, QueryExecutor};
use tieout::models::TieStatus;
use tieout::recon::{AmountSelection, ReconError, ReconciliationView, Side};

type Responder = fn(&str) -> (u16, String);

/// Serves the query API on a loopback port; every request body's `sql` is
/// logged and answered by `responder`.
fn serve(responder: Responder) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("loopback port should bind");
    let address = listener.local_addr().expect("listener should have an address");
    let log = Arc::new(Mutex::new(Vec::new()));
    let server_log = Arc::clone(&log);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let sql = read_sql(&mut stream);
            server_log
                .lock()
                .expect("request log should not be poisoned")
                .push(sql.clone());
            let (status, payload) = responder(&sql);
            let reason = if status == 200 { "OK" } else { "Error" };
            let _ = write!(
                stream,
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
        }
    });

    (format!("http://{address}/"), log)
}

fn read_sql(stream: &mut TcpStream) -> String {
    let mut reader = BufReader::new(stream);
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .expect("request header should be readable");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().expect("content-length should be numeric");
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader
        .read_exact(&mut body)
        .expect("request body should be readable");
    let request: Value = serde_json::from_slice(&body).expect("request body should be JSON");
    request
        .get("sql")
        .and_then(Value::as_str)
        .expect("request should carry sql")
        .to_string()
}

fn warehouse(sql: &str) -> (u16, String) {
    let payload = if sql.contains("FULL OUTER JOIN") {
        json!({
            "success": true,
            "columns": [
                "tie_key", "mart_key_value", "metric_key_value", "tie_status",
                "mart_amount", "metric_amount", "amount_delta"
            ],
            "data": [
                {
                    "tie_key": "7", "mart_key_value": 7, "metric_key_value": null,
                    "tie_status": "mart_only", "mart_amount": 12.0,
                    "metric_amount": null, "amount_delta": 12.0
                },
                {
                    "tie_key": "1", "mart_key_value": 1, "metric_key_value": 1,
                    "tie_status": "matched", "mart_amount": 100.0,
                    "metric_amount": 90.0, "amount_delta": 10.0
                }
            ],
            "row_count": 2
        })
    } else if sql.contains("gold_marts") {
        json!({"success": true, "columns": ["client_id", "revenue"], "data": [], "row_count": 0})
    } else if sql.contains("gold_metrics") {
        // No `columns`: names come from the first row.
        json!({
            "success": true,
            "data": [{"client_id": 1, "revenue_usd": 90.0}],
            "row_count": 1
        })
    } else {
        return (400, json!({"detail": "unexpected query"}).to_string());
    };
    (200, payload.to_string())
}

fn failing_warehouse(_sql: &str) -> (u16, String) {
    (500, json!({"detail": "Binder Error: table not found"}).to_string())
}

fn garbled_warehouse(_sql: &str) -> (u16, String) {
    (200, "<html>not json</html>".to_string())
}

#[test]
fn tie_out_over_http_uses_duckdb_casts() {
    let (base_url, log) = serve(warehouse);
    let executor = HttpExecutor::new(&base_url, None).expect("client should build");
    let mut view = ReconciliationView::new(
        "SELECT client_id, revenue FROM gold_marts.client_revenue",
        "SELECT client_id, revenue_usd FROM gold_metrics.client_revenue",
    )
    .with_amounts(AmountSelection {
        mart_amount: Some("revenue".to_string()),
        metric_amount: Some("revenue_usd".to_string()),
    });

    view.run_tie_out(&executor).expect("tie-out should succeed");

    assert_eq!(view.keys.mart_key.as_deref(), Some("client_id"));
    assert_eq!(view.keys.metric_key.as_deref(), Some("client_id"));
    let rows = view.tie_rows().expect("rows should decode");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].tie_status, TieStatus::MartOnly);
    assert_eq!(rows[1].amount_delta, 10.0);

    let requests = log.lock().expect("request log should not be poisoned").clone();
    assert_eq!(requests.len(), 3);
    let tie_sql = requests
        .iter()
        .find(|sql| sql.contains("FULL OUTER JOIN"))
        .expect("reconciliation sql should be sent");
    assert!(tie_sql.contains("TRY_CAST(m.\"revenue\" AS DOUBLE)"), "sql: {tie_sql}");
    assert!(tie_sql.contains("AS VARCHAR"), "sql: {tie_sql}");
    assert!(
        requests
            .iter()
            .filter(|sql| !sql.contains("FULL OUTER JOIN"))
            .all(|sql| sql.ends_with("SELECT * FROM q LIMIT 1"))
    );
}

#[test]
fn http_errors_carry_status_and_detail_for_both_sides() {
    let (base_url, _log) = serve(failing_warehouse);
    let executor = HttpExecutor::new(&base_url, None).expect("client should build");
    let mut view = ReconciliationView::new("SELECT 1 AS id", "SELECT 2 AS id");

    let error = view.run_tie_out(&executor).expect_err("inspection must fail");
    let ReconError::Inspection(failures) = &error else {
        panic!("unexpected error: {error:?}");
    };
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].side, Side::Mart);
    assert_eq!(failures[1].side, Side::Metric);
    assert_eq!(
        error.to_string(),
        "Mart query: HTTP 500: Binder Error: table not found; \
         Metric query: HTTP 500: Binder Error: table not found"
    );
}

#[test]
fn undecodable_body_is_a_parse_error() {
    let (base_url, _log) = serve(garbled_warehouse);
    let executor = HttpExecutor::new(&base_url, None).expect("client should build");

    let result = executor.execute_query("SELECT 1");
    assert!(!result.success);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|message| message.starts_with("Parse error: ")),
        "unexpected error: {:?}",
        result.error
    );
}
