use chrono::{TimeZone, Utc};
use nuodb_middleware::prelude::*;
use nuodb_middleware::test_utils::{CallKind, FakeClient, open_fake};

const LIST_USERS: &str = "SELECT id, name, score, active, created, avatar FROM users";

fn users_client() -> FakeClient {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    FakeClient::new().with_rows(
        LIST_USERS,
        ["ID", "NAME", "SCORE", "ACTIVE", "CREATED", "AVATAR"],
        vec![
            vec![
                RowValues::Int(1),
                RowValues::Text("alice".into()),
                RowValues::Float(9.5),
                RowValues::Bool(true),
                RowValues::from(created),
                RowValues::Blob(vec![0xde, 0xad]),
            ],
            vec![
                RowValues::Int(2),
                RowValues::Text(String::new()),
                RowValues::Null,
                RowValues::Bool(false),
                RowValues::Null,
                RowValues::Blob(Vec::new()),
            ],
        ],
    )
}

#[test]
fn decodes_every_column_kind() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;

    let first = rows.next_row()?.ok_or("missing first row")?;
    assert_eq!(first.get("ID"), Some(&RowValues::Int(1)));
    assert_eq!(first.get("NAME").and_then(RowValues::as_text), Some("alice"));
    assert_eq!(first.get("SCORE").and_then(RowValues::as_float), Some(9.5));
    assert_eq!(first.get("ACTIVE").and_then(RowValues::as_bool), Some(&true));
    let created = first
        .get("CREATED")
        .and_then(RowValues::as_timestamp)
        .ok_or("missing timestamp")?;
    assert_eq!(created, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    assert_eq!(first.get("AVATAR").and_then(RowValues::as_blob), Some(&[0xde, 0xad][..]));

    let second = rows.next_row()?.ok_or("missing second row")?;
    // empty strings and blobs stay distinct from NULL
    assert_eq!(second.get("NAME"), Some(&RowValues::Blob(Vec::new())));
    assert_eq!(second.get("SCORE"), Some(&RowValues::Null));
    assert_eq!(second.get("AVATAR"), Some(&RowValues::Blob(Vec::new())));
    assert_eq!(second.get("CREATED"), Some(&RowValues::Null));

    assert!(rows.next_row()?.is_none());
    Ok(())
}

#[test]
fn timestamps_follow_connection_zone() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = NuoDbOptions::builder("test@localhost".into(), "dba".into(), "dba".into())
        .timezone("Asia/Tokyo")
        .open(Box::new(client.clone()))?;
    let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;

    let row = rows.next_row()?.ok_or("missing row")?;
    let created = row
        .get("CREATED")
        .and_then(RowValues::as_timestamp)
        .ok_or("missing timestamp")?;
    assert_eq!(created.offset().local_minus_utc(), 9 * 3600);
    assert_eq!(created, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    Ok(())
}

#[test]
fn end_of_data_is_latched() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;
    let mut dest = vec![RowValues::Null; rows.column_count()];

    while rows.next(&mut dest)? {}
    let probe = client.probe();
    assert_eq!(probe.open_result_sets(), 0);
    // the one-shot statement is released with the cursor
    assert_eq!(probe.open_statements(), 0);

    probe.clear_calls();
    assert!(!rows.next(&mut dest)?);
    assert!(!rows.next(&mut dest)?);
    rows.close()?;
    rows.close()?;
    assert!(probe.calls().is_empty());

    assert!(matches!(rows.next(&mut dest), Err(NuoDbError::Uninitialized)));
    Ok(())
}

#[test]
fn close_releases_open_cursor_once() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    let stmt = conn.prepare(LIST_USERS)?;
    let mut rows = stmt.query(&[], &Deadline::none())?;
    assert!(rows.next_row()?.is_some());

    rows.close()?;
    rows.close()?;
    let probe = client.probe();
    assert_eq!(probe.count(CallKind::CloseResultSet), 1);
    assert_eq!(probe.open_result_sets(), 0);
    // the prepared statement outlives its cursor
    assert_eq!(probe.count(CallKind::CloseStatement), 0);
    Ok(())
}

#[test]
fn dropping_rows_closes_them() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    {
        let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;
        assert!(rows.next_row()?.is_some());
    }
    let probe = client.probe();
    assert_eq!(probe.open_result_sets(), 0);
    assert_eq!(probe.open_statements(), 0);
    Ok(())
}

#[test]
fn zero_columns_end_without_fetching() -> Result<(), Box<dyn std::error::Error>> {
    let client = FakeClient::new();
    let conn = open_fake(&client)?;
    let mut rows = conn.query("SELECT nothing", &[], &Deadline::none())?;

    assert!(rows.columns().is_empty());
    assert!(!rows.next(&mut [])?);
    let probe = client.probe();
    assert_eq!(probe.count(CallKind::ColumnNames), 0);
    assert_eq!(probe.count(CallKind::Next), 0);

    rows.close()?;
    assert_eq!(probe.open_result_sets(), 0);
    Ok(())
}

#[test]
fn column_name_failure_closes_result_set() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client().failing_on(CallKind::ColumnNames, -5, "metadata unavailable");
    let conn = open_fake(&client)?;

    let err = conn.query(LIST_USERS, &[], &Deadline::none()).unwrap_err();
    assert_eq!(err.to_string(), "nuodb: metadata unavailable");
    let probe = client.probe();
    assert_eq!(probe.count(CallKind::CloseResultSet), 1);
    assert_eq!(probe.open_result_sets(), 0);
    assert_eq!(probe.open_statements(), 0);
    Ok(())
}

#[test]
fn fetch_failure_is_native_error() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;

    client.probe().fail_on(CallKind::Next, -7, "network dropped");
    let err = rows.next_row().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode(-7)));
    assert_eq!(err.code().map(ErrorCode::name), Some("NETWORK_ERROR"));

    client.probe().clear_failures();
    assert!(rows.next_row()?.is_some());
    Ok(())
}

#[test]
fn short_destination_is_rejected_before_fetch() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;

    let mut dest = vec![RowValues::Null; 2];
    assert!(matches!(rows.next(&mut dest), Err(NuoDbError::ExecutionError(_))));
    assert_eq!(client.probe().count(CallKind::Next), 0);
    Ok(())
}

#[test]
fn collects_into_result_set() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;

    let result = conn
        .query(LIST_USERS, &[], &Deadline::none())?
        .collect_result_set()?;
    assert_eq!(result.len(), 2);
    assert_eq!(result.rows_affected, 2);
    assert_eq!(
        result.get_column_names().map(|names| names.len()),
        Some(6)
    );
    assert_eq!(result.results[1].get("ID"), Some(&RowValues::Int(2)));
    assert_eq!(client.probe().open_result_sets(), 0);
    Ok(())
}

#[test]
fn first_close_error_wins_when_both_handles_fail() -> Result<(), Box<dyn std::error::Error>> {
    let client = users_client();
    let conn = open_fake(&client)?;
    let mut rows = conn.query(LIST_USERS, &[], &Deadline::none())?;

    let probe = client.probe();
    probe.fail_on(CallKind::CloseResultSet, -5, "rs close failed");
    probe.fail_on(CallKind::CloseStatement, -5, "stmt close failed");
    let err = rows.close().unwrap_err();
    assert_eq!(err.to_string(), "nuodb: rs close failed");
    assert_eq!(probe.count(CallKind::CloseResultSet), 1);
    assert_eq!(probe.count(CallKind::CloseStatement), 1);

    // both handles were given up; a second close makes no calls
    rows.close()?;
    assert_eq!(probe.count(CallKind::CloseResultSet), 1);
    assert_eq!(probe.count(CallKind::CloseStatement), 1);
    Ok(())
}
