//! Integration tests for the export session lifecycle.
//!
//! All scenarios run against the in-memory transport, so no database is needed:
//!
//! ```bash
//! cargo test --test export_session_tests
//! ```

mod common;

use std::time::Duration;

use bytes::Bytes;
use common::{id_name_columns, session_over, transport, HOST};
use tpt_export::export::read_archive_header;
use tpt_export::*;

// =============================================================================
// Example scenario
// =============================================================================

#[tokio::test]
async fn test_full_export_scenario() {
    let (mut session, log) = session_over(transport(3));

    assert_eq!(session.state(), SessionState::Created);
    assert_eq!(
        session.attributes().get_integer(AttributeKey::MinSessions),
        Some(2)
    );
    assert_eq!(
        session.attributes().get_integer(AttributeKey::MaxSessions),
        Some(5)
    );

    session.add_attribute(AttributeKey::MaxSessions, 10).unwrap();
    assert_eq!(
        session.attributes().get_integer(AttributeKey::MaxSessions),
        Some(10)
    );
    assert_eq!(session.state(), SessionState::Configured);

    session
        .set_encoding(ROW_ENCODING_LIST | DATETIME_AS_NATIVE)
        .unwrap();
    assert_eq!(session.encoding().row, RowEncoding::List);
    assert_eq!(session.encoding().datetime, DatetimeEncoding::Native);
    assert_eq!(session.encoding().decimal, DecimalEncoding::String);

    session.set_query("select id, name from t").unwrap();
    session.initiate().await.unwrap();
    assert_eq!(session.state(), SessionState::Active);

    let columns = session.columns().unwrap();
    assert_eq!(columns, &id_name_columns());
    assert_eq!(columns.to_string(), "[id INTEGER, name VARCHAR(32)]");

    let mut buffers = 0;
    loop {
        match session.next().await.unwrap() {
            Chunk::Buffer(_) => buffers += 1,
            Chunk::EndOfStream => break,
        }
    }
    assert_eq!(buffers, 3);

    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(log.opened(), 1);
    assert_eq!(log.terminated(), 1);
    assert_eq!(log.hosts(), vec![HOST.to_string()]);
    assert_eq!(
        log.attribute(&AttributeKey::MaxSessions),
        Some(AttributeValue::Integer(10))
    );
}

// =============================================================================
// Lifecycle properties
// =============================================================================

#[tokio::test]
async fn test_close_is_idempotent_in_every_state() {
    let (mut created, _) = session_over(transport(1));
    created.close();
    created.close();
    assert_eq!(created.state(), SessionState::Terminated);

    let (mut configured, _) = session_over(transport(1));
    configured.set_query("t").unwrap();
    configured.close();
    configured.close();
    assert_eq!(configured.state(), SessionState::Terminated);

    let (mut active, log) = session_over(transport(1));
    active.set_query("t").unwrap();
    active.initiate().await.unwrap();
    active.close();
    active.close();
    assert_eq!(active.state(), SessionState::Terminated);
    assert_eq!(log.terminated(), 1);
}

#[tokio::test]
async fn test_finite_export_yields_single_end_of_stream() {
    for n in [0usize, 1, 7] {
        let (mut session, _) = session_over(transport(n));
        session.set_query("select 1").unwrap();
        session.initiate().await.unwrap();

        let mut buffers = 0;
        while let Chunk::Buffer(_) = session.next().await.unwrap() {
            buffers += 1;
        }
        assert_eq!(buffers, n);
        assert!(matches!(
            session.next().await,
            Err(ExportError::Lifecycle(LifecycleError::StreamExhausted))
        ));
    }
}

#[tokio::test]
async fn test_attributes_immutable_after_active() {
    let (mut session, _) = session_over(transport(1));
    session.set_query("select 1").unwrap();
    session.initiate().await.unwrap();
    let before = session.attributes().clone();

    for result in [
        session.add_attribute(AttributeKey::MaxSessions, 1),
        session.add_named_attribute("charset", "ASCII"),
        session.set_encoding(VALUES),
        session.set_null("-"),
        session.set_delimiter(","),
        session.set_query("select 2"),
    ] {
        assert!(matches!(
            result,
            Err(ExportError::Lifecycle(LifecycleError::InvalidState {
                state: SessionState::Active,
                ..
            }))
        ));
    }
    assert_eq!(session.attributes(), &before);
}

#[tokio::test]
async fn test_columns_require_active() {
    let (mut session, _) = session_over(transport(1));
    assert!(session.columns().is_err());
    session.set_query("select 1").unwrap();
    assert_eq!(
        session.columns().unwrap_err().lifecycle_state(),
        Some(SessionState::Configured)
    );

    session.initiate().await.unwrap();
    assert!(!session.columns().unwrap().is_empty());
}

#[tokio::test]
async fn test_terminated_session_cannot_restart() {
    let (mut session, log) = session_over(transport(1));
    session.set_query("select 1").unwrap();
    session.initiate().await.unwrap();
    session.close();

    let err = session.initiate().await.unwrap_err();
    assert_eq!(err.lifecycle_state(), Some(SessionState::Terminated));
    assert_eq!(log.opened(), 1);
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_category_scoped_merge_is_order_independent() {
    let rows = RowEncoding::ALL.iter().map(|r| r.bits());
    let datetimes: Vec<u32> = DatetimeEncoding::ALL.iter().map(|d| d.bits()).collect();
    let decimals: Vec<u32> = DecimalEncoding::ALL.iter().map(|d| d.bits()).collect();

    for row in rows {
        for &datetime in &datetimes {
            for &decimal in &decimals {
                let masks = [row, datetime, decimal];
                let orders = [
                    [0, 1, 2],
                    [0, 2, 1],
                    [1, 0, 2],
                    [1, 2, 0],
                    [2, 0, 1],
                    [2, 1, 0],
                ];
                let results: Vec<_> = orders
                    .iter()
                    .map(|order| {
                        order.iter().try_fold(EncodingSettings::default(), |acc, &i| {
                            acc.merge(masks[i])
                        })
                        .ok()
                    })
                    .collect();
                for result in &results[1..] {
                    assert_eq!(result, &results[0]);
                }
            }
        }
    }
}

#[test]
fn test_rejected_encoding_keeps_settings() {
    let (mut session, _) = session_over(transport(1));
    session.set_encoding(DECIMAL_AS_FLOAT).unwrap();

    let err = session
        .set_encoding(ROW_ENCODING_RAW | DATETIME_AS_NATIVE)
        .unwrap_err();
    assert!(matches!(
        err,
        ExportError::Encoding(EncodingError::UnsupportedEncoding { .. })
    ));
    assert_eq!(session.encoding().decimal, DecimalEncoding::Float);
    assert_eq!(session.encoding().row, RowEncoding::String);
}

// =============================================================================
// Tenacity and retries
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_queued_logon_eventually_succeeds() {
    let (mut session, log) = session_over(transport(2).with_unavailable_handshakes(30));
    session.set_query("select 1").unwrap();
    session.add_attribute(AttributeKey::TenacitySleep, 5).unwrap();

    let start = tokio::time::Instant::now();
    session.initiate().await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(150));
    assert_eq!(log.handshakes(), 31);
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_tenacity_exhaustion_leaves_state_unchanged() {
    let (mut session, log) = session_over(transport(2).with_unavailable_handshakes(usize::MAX));
    session.set_query("select 1").unwrap();
    session.add_attribute(AttributeKey::TenacitySleep, 600).unwrap();

    let err = session.initiate().await.unwrap_err();

    match err {
        ExportError::Connection(ConnectionError::TenacityExhausted {
            host,
            attempts,
            hours,
            last,
        }) => {
            assert_eq!(host, HOST);
            assert_eq!(attempts, 7);
            assert_eq!(hours, 1);
            assert!(last.is_retryable());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.state(), SessionState::Configured);
    assert_eq!(log.terminated(), 1);
}

#[tokio::test]
async fn test_rejected_logon_fails_fast() {
    let (mut session, log) = session_over(
        transport(2).with_handshake_error(TransportError::Rejected("bad password".to_string())),
    );
    session.set_query("select 1").unwrap();

    let err = session.initiate().await.unwrap_err();
    assert!(matches!(
        err,
        ExportError::Connection(ConnectionError::Rejected { .. })
    ));
    assert_eq!(log.handshakes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_buffer_failure_is_retried() {
    let (mut session, _) = session_over(transport(3).with_transient_buffer_failures(2, 3));
    session.set_query("select 1").unwrap();
    session.initiate().await.unwrap();

    let buffers = export_to_list(&mut session).await.unwrap();
    assert_eq!(buffers.len(), 3);
    assert_eq!(buffers[2], Bytes::from("3|name-3\n"));
}

// =============================================================================
// Export helpers
// =============================================================================

#[tokio::test]
async fn test_export_to_file_with_header_and_gzip() {
    use std::io::Read;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("out.csv{}", Compression::Gzip.extension()));
    let (mut session, log) = session_over(transport(2));
    session.set_query("select id, name from t").unwrap();
    session.set_delimiter(",").unwrap();

    let summary = export_to_file(
        &mut session,
        &path,
        ExportOptions::new()
            .compression(Compression::from_path(&path))
            .with_header(true),
    )
    .await
    .unwrap();

    let compressed = std::fs::read(&path).unwrap();
    let mut text = String::new();
    flate2::read::GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "id,name\n1|name-1\n2|name-2\n");
    assert_eq!(summary.buffers, 2);
    assert_eq!(summary.bytes_written, compressed.len() as u64);
    assert_eq!(log.terminated(), 1);
}

#[tokio::test]
async fn test_archive_round_trip() {
    let (mut session, _) = session_over(transport(2));
    session.set_query("t").unwrap();
    let mut out: Vec<u8> = Vec::new();

    write_archive(&mut session, &mut out).await.unwrap();

    let mut reader = out.as_slice();
    let columns = read_archive_header(&mut reader).await.unwrap();
    assert_eq!(columns, id_name_columns());
    assert_eq!(reader, b"1|name-1\n2|name-2\n");
}

#[tokio::test(start_paused = true)]
async fn test_export_timeout_closes_session() {
    let (mut session, log) = session_over(transport(2).with_unavailable_handshakes(usize::MAX));
    session.set_query("select 1").unwrap();

    let err = export_to_stream(
        &mut session,
        tokio::io::sink(),
        ExportOptions::new().timeout_ms(2_500),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ExportError::Connection(ConnectionError::Timeout { timeout_ms: 2_500 })
    ));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(log.opened(), 1);
    assert_eq!(log.terminated(), 1);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_session_from_json_options() {
    let json = r#"{
        "defaults": { "min_sessions": 1, "max_sessions": 3 },
        "attributes": { "tenacity_hours": 4 },
        "encoding": 4,
        "delimiter": ";"
    }"#;
    let options = SessionOptions::from_json(json).unwrap();
    let session = ExportSession::with_options(
        std::sync::Arc::new(transport(0)),
        HOST,
        "u",
        "p",
        options,
    )
    .unwrap();

    assert_eq!(
        session.attributes().get_integer(AttributeKey::MaxSessions),
        Some(3)
    );
    assert_eq!(
        session.attributes().get_integer(AttributeKey::TenacityHours),
        Some(4)
    );
    assert_eq!(session.encoding().row, RowEncoding::List);
    assert_eq!(session.encoder().delimiter(), ";");
}

#[test]
fn test_unknown_attribute_name() {
    let (mut session, _) = session_over(transport(0));
    let err = session.add_named_attribute("max-session", 3).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Configuration(ConfigurationError::UnknownKey(_))
    ));
    assert_eq!(session.state(), SessionState::Created);
}

#[test]
fn test_arrow_schema_for_columns() {
    let schema = id_name_columns().to_arrow_schema();
    assert_eq!(schema.fields().len(), 2);
    assert_eq!(schema.field(0).data_type(), &arrow::datatypes::DataType::Int32);
    assert_eq!(schema.field(1).data_type(), &arrow::datatypes::DataType::Utf8);
}
