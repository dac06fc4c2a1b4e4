use std::sync::Arc;

use nuodb_middleware::prelude::*;
use nuodb_middleware::registry::registered_drivers;
use nuodb_middleware::test_utils::{CallKind, FakeClient, FakeClientFactory, NativeCall, test_options};

#[test]
fn options_deserialize_with_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let opts: NuoDbOptions = serde_json::from_str(
        r#"{
            "database": "test@localhost:48004",
            "username": "dba",
            "properties": { "schema": "user", "timezone": "Europe/Berlin" }
        }"#,
    )?;
    assert_eq!(opts.password, "");
    assert!(!opts.strict_arguments);
    assert_eq!(
        opts.time_zone()?,
        TimeZoneSetting::Named(chrono_tz::Europe::Berlin)
    );
    Ok(())
}

#[test]
fn all_properties_reach_the_client() -> Result<(), Box<dyn std::error::Error>> {
    let client = FakeClient::new();
    let _conn = Connection::open(Box::new(client.clone()), &test_options())?;

    let calls = client.probe().calls();
    let Some(NativeCall::Open {
        database,
        username,
        properties,
    }) = calls.first()
    else {
        panic!("expected open as the first call");
    };
    assert_eq!(database, "test@localhost");
    assert_eq!(username, "dba");
    assert!(properties.contains(&("schema".to_string(), "user".to_string())));
    assert!(properties.contains(&("timezone".to_string(), "UTC".to_string())));
    Ok(())
}

#[test]
fn unknown_zone_fails_before_open() {
    let client = FakeClient::new();
    let opts = NuoDbOptions::builder("test@localhost".into(), "dba".into(), "dba".into())
        .timezone("Nowhere/Special")
        .finish();

    let err = Connection::open(Box::new(client.clone()), &opts).unwrap_err();
    assert!(matches!(err, NuoDbError::ConfigError(_)));
    assert!(client.probe().calls().is_empty());
}

#[test]
fn failed_open_closes_the_client() {
    let client = FakeClient::new().failing_on(CallKind::Open, -10, "can't reach broker");

    let err = Connection::open(Box::new(client.clone()), &test_options()).unwrap_err();
    assert_eq!(err.to_string(), "nuodb: can't reach broker");
    assert_eq!(err.code().map(ErrorCode::name), Some("CONNECTION_ERROR"));
    assert_eq!(client.probe().count(CallKind::Close), 1);
}

#[test]
fn dropping_connection_closes_native_handle() -> Result<(), Box<dyn std::error::Error>> {
    let client = FakeClient::new();
    {
        let _conn = Connection::open(Box::new(client.clone()), &test_options())?;
        assert!(client.probe().is_open());
    }
    assert!(!client.probe().is_open());
    assert_eq!(client.probe().count(CallKind::Close), 1);
    Ok(())
}

#[test]
fn registry_opens_named_drivers() -> Result<(), Box<dyn std::error::Error>> {
    let client = FakeClient::new().with_affected("DELETE FROM t", 4, 0);
    register_driver("fake-registry", Arc::new(FakeClientFactory::new(client.clone())))?;

    let again = register_driver("fake-registry", Arc::new(FakeClientFactory::new(FakeClient::new())));
    assert!(matches!(again, Err(NuoDbError::ConfigError(_))));
    assert!(registered_drivers().contains(&"fake-registry".to_string()));

    let conn = open_registered("fake-registry", &test_options())?;
    let result = conn.execute("DELETE FROM t", &Deadline::none())?;
    assert_eq!(result.rows_affected(), Some(4));

    let missing = open_registered("no-such-driver", &test_options());
    assert!(matches!(missing, Err(NuoDbError::ConfigError(_))));
    Ok(())
}
