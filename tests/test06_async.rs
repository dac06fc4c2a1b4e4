use nuodb_middleware::prelude::*;
use nuodb_middleware::test_utils::{CallKind, FakeClient, test_options};

const SELECT_NAMES: &str = "SELECT id, name FROM people WHERE id > ?";

fn people_client() -> FakeClient {
    FakeClient::new()
        .with_rows(SELECT_NAMES, ["ID", "NAME"], vec![
            vec![RowValues::Int(1), RowValues::Text("ann".into())],
            vec![RowValues::Int(2), RowValues::Text("bo".into())],
        ])
        .with_affected("INSERT INTO people VALUES (?, ?)", 1, 3)
}

#[tokio::test]
async fn async_query_materializes_rows() -> Result<(), Box<dyn std::error::Error>> {
    let client = people_client();
    let conn = AsyncConnection::open(Box::new(client.clone()), test_options()).await?;

    let rs = conn
        .query(SELECT_NAMES, vec![RowValues::Int(0)], Deadline::none())
        .await?;
    assert_eq!(rs.len(), 2);
    assert_eq!(rs.results[0].get("NAME").and_then(RowValues::as_text), Some("ann"));
    assert_eq!(rs.results[1].get("ID"), Some(&RowValues::Int(2)));

    let probe = client.probe();
    assert_eq!(probe.last_bind(), Some(vec![RowValues::Int(0)]));
    assert_eq!(probe.open_result_sets(), 0);
    assert_eq!(probe.open_statements(), 0);
    Ok(())
}

#[tokio::test]
async fn async_execute_and_close() -> Result<(), Box<dyn std::error::Error>> {
    let client = people_client();
    let conn = AsyncConnection::open(Box::new(client.clone()), test_options()).await?;

    let created = conn
        .execute("CREATE TABLE people (id INT, name STRING)", Deadline::none())
        .await?;
    assert_eq!(created, ExecResult::NoRows);

    let inserted = conn
        .execute_with_params(
            "INSERT INTO people VALUES (?, ?)",
            vec![RowValues::Int(3), RowValues::Text("cy".into())],
            Deadline::none(),
        )
        .await?;
    assert_eq!(inserted.last_insert_id(), Some(3));

    conn.close().await?;
    assert!(conn.blocking().is_closed());
    let err = conn.execute("DELETE FROM people", Deadline::none()).await.unwrap_err();
    assert!(matches!(err, NuoDbError::Closed));
    assert_eq!(client.probe().count(CallKind::Close), 1);
    Ok(())
}

#[tokio::test]
async fn with_connection_runs_a_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let client = people_client();
    let conn = AsyncConnection::open(Box::new(client.clone()), test_options()).await?;

    let id = conn
        .with_connection(|conn| {
            let tx = conn.begin()?;
            let result = tx.execute_with_params(
                "INSERT INTO people VALUES (?, ?)",
                &[RowValues::Int(4), RowValues::Text("di".into())],
                &Deadline::none(),
            )?;
            tx.commit()?;
            Ok(result.last_insert_id())
        })
        .await?;
    assert_eq!(id, Some(3));

    let probe = client.probe();
    assert_eq!(probe.count(CallKind::Commit), 1);
    assert!(probe.autocommit());
    Ok(())
}
