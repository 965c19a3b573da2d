//! Message-driven pipeline tests
//!
//! stf_ready in, TF registrations and notifications out, against the
//! in-memory catalog and broker.

use fastmon_agent::tf::{register_tf_file, TfDescriptor};
use fastmon_agent::{MessageOutcome, Method};
use fastmon_protocol::{AgentMessage, AgentStatus, HeartbeatStatus, RecordId, TfMetadata};
use fastmon_test_utils::{capture_logs, stf_ready, MockCatalog, RecordingBroker, TestEnv};
use serde_json::json;
use std::time::Duration;

fn stf_ready_json(filename: &str, size: u64) -> serde_json::Value {
    let mut value = serde_json::to_value(stf_ready(filename, size)).unwrap();
    value["msg_type"] = json!("stf_ready");
    value
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_stf_ready_registers_and_announces_tfs() {
    let env = TestEnv::new();
    let mut config = env.config.clone();
    config.tf_size_fraction = 0.15;
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent_with(config, &catalog, &broker);

    let payload = serde_json::to_vec(&stf_ready_json("run_42_data.stf", 1_000_000)).unwrap();
    let outcome = agent.on_message(&payload).await;

    assert_eq!(outcome, MessageOutcome::Processed { tf_files: 2 });

    let posts = catalog.calls_to(Method::Post, "/fastmon-files/");
    assert_eq!(posts.len(), 2);
    let body = posts[0].body.as_ref().unwrap();
    assert_eq!(body["stf_file"], "run_42_data.stf-id");
    assert_eq!(body["tf_filename"], "run_42_data_tf_001.tf");
    assert_eq!(body["status"], "registered");
    assert_eq!(body["metadata"]["simulation"], true);
    assert_eq!(body["metadata"]["tf_size_fraction"], 0.15);
    assert_eq!(posts[1].body.as_ref().unwrap()["tf_filename"], "run_42_data_tf_002.tf");

    let notifications = broker.sent_of_type("tf_file_registered");
    assert_eq!(notifications.len(), 2);
    for message in &notifications {
        match message {
            AgentMessage::TfFileRegistered(msg) => {
                assert_eq!(msg.run_number, Some(RecordId::Int(42)));
                assert_eq!(msg.stf_filename.as_deref(), Some("run_42_data.stf"));
                assert_eq!(msg.processed_by, "fastmon-test");
                assert!(msg.tf_file_id.is_some());
                assert!(msg.message.ends_with("registered for fast monitoring"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    for (destination, _) in broker.sent() {
        assert_eq!(destination, "epictopic");
    }

    let metrics = agent.metrics();
    assert_eq!(metrics.stf_messages_processed, 1);
    assert_eq!(metrics.tf_files_created, 2);
    assert_eq!(metrics.notifications_sent, 2);
}

#[tokio::test]
async fn test_heartbeat_sent_for_each_stf_ready() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let payload = serde_json::to_vec(&stf_ready_json("a.stf", 1000)).unwrap();
    agent.on_message(&payload).await;
    agent.on_message(br#"{"msg_type":"run_imminent"}"#).await;
    agent.on_message(&payload).await;

    let heartbeats = broker.sent_of_type("agent_heartbeat");
    assert_eq!(heartbeats.len(), 2, "no heartbeat for run_imminent");
    match &heartbeats[1] {
        AgentMessage::AgentHeartbeat(hb) => {
            assert_eq!(hb.status, HeartbeatStatus::Busy);
            assert_eq!(hb.agent_type, "fastmon");
            assert_eq!(hb.messages_processed, 1);
            assert_eq!(hb.tf_files_created, 2);
        }
        other => panic!("unexpected message {:?}", other),
    }
}

// ============================================================================
// Edge cases
// ============================================================================

#[tokio::test]
async fn test_missing_filename_produces_no_tfs() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let outcome = agent
        .on_message(br#"{"msg_type":"stf_ready","size_bytes":1000}"#)
        .await;

    assert_eq!(outcome, MessageOutcome::Processed { tf_files: 0 });
    assert!(catalog.calls().is_empty());
    assert!(broker.sent_of_type("tf_file_registered").is_empty());
}

#[tokio::test]
async fn test_unknown_message_type_ignored() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let outcome = agent
        .on_message(br#"{"msg_type":"run_imminent","run_id":1}"#)
        .await;

    assert_eq!(
        outcome,
        MessageOutcome::Ignored {
            msg_type: "run_imminent".to_string()
        }
    );
    assert!(catalog.calls().is_empty());
    assert!(broker.sent_of_type("fastmon_status").is_empty());
}

#[tokio::test]
async fn test_decode_failure_reports_error_status() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let outcome = agent.on_message(b"not json").await;
    assert!(matches!(outcome, MessageOutcome::Rejected { .. }));

    let statuses = broker.sent_of_type("fastmon_status");
    assert_eq!(statuses.len(), 1);
    match &statuses[0] {
        AgentMessage::FastmonStatus(status) => {
            assert_eq!(status.status, AgentStatus::Error);
            assert!(status.message.starts_with("Message processing error"));
        }
        other => panic!("unexpected message {:?}", other),
    }
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn test_own_broadcasts_are_skipped() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let echo = json!({
        "msg_type": "agent_heartbeat",
        "agent_name": "fastmon-test",
        "agent_type": "fastmon",
        "status": "busy",
        "messages_processed": 0,
        "tf_files_created": 0,
        "timestamp": "2025-08-01T00:00:00Z",
    });
    let outcome = agent.on_message(&serde_json::to_vec(&echo).unwrap()).await;

    assert!(matches!(outcome, MessageOutcome::Ignored { .. }));
    assert!(broker.sent().is_empty(), "no heartbeat in reply to our own heartbeat");
}

#[tokio::test]
async fn test_other_agent_heartbeat_gets_no_reply() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let heartbeat = json!({
        "msg_type": "agent_heartbeat",
        "agent_name": "fastmon-other",
        "agent_type": "fastmon",
        "status": "busy",
        "messages_processed": 3,
        "tf_files_created": 6,
        "timestamp": "2025-08-01T00:00:00Z",
    });
    let outcome = agent
        .on_message(&serde_json::to_vec(&heartbeat).unwrap())
        .await;

    assert_eq!(
        outcome,
        MessageOutcome::Ignored {
            msg_type: "agent_heartbeat".to_string()
        }
    );
    assert!(broker.sent().is_empty());
}

#[tokio::test]
async fn test_sibling_broadcasts_with_naive_timestamps_are_ignored() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let status = json!({
        "msg_type": "fastmon_status",
        "processed_by": "swf-fastmon-agent",
        "status": "OK",
        "message": "Emulating 2 fast monitoring files",
        "timestamp": "2025-08-01T12:00:00.123456",
    });
    let tf = json!({
        "msg_type": "tf_file_registered",
        "processed_by": "swf-fastmon-agent",
        "tf_file_id": "abc",
        "tf_filename": "run_1_tf_001.tf",
        "timestamp": "2025-08-01T12:00:00.123456",
    });

    for payload in [status, tf] {
        let outcome = agent.on_message(&serde_json::to_vec(&payload).unwrap()).await;
        assert!(matches!(outcome, MessageOutcome::Ignored { .. }), "{:?}", outcome);
    }

    assert!(broker.sent_of_type("fastmon_status").is_empty());
    assert!(broker.sent().is_empty());
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn test_tf_registration_failure_skips_notification() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new().fail_on(Method::Post, "/fastmon-files/");
    let broker = RecordingBroker::new();
    let mut agent = env.agent(&catalog, &broker);

    let records = agent.process_stf_ready(&stf_ready("a.stf", 1000)).await;

    assert!(records.is_empty());
    assert_eq!(catalog.count(Method::Post, "/fastmon-files/"), 2);
    assert!(broker.sent_of_type("tf_file_registered").is_empty());
    assert_eq!(agent.metrics().tf_registration_failures, 2);
}

#[tokio::test]
async fn test_register_tf_failure_logs_one_error() {
    let catalog = MockCatalog::new().fail_on(Method::Post, "/fastmon-files/");
    let descriptor = TfDescriptor {
        tf_filename: "a_tf_001.tf".to_string(),
        file_size_bytes: 10,
        sequence_number: 1,
        stf_file_id: Some(RecordId::from("stf-1")),
        stf_parent: Some("a.stf".to_string()),
        metadata: TfMetadata {
            simulation: true,
            created_from: Some("a.stf".to_string()),
            tf_size_fraction: 0.15,
            agent_name: "fastmon-test".to_string(),
            state: None,
            substate: None,
            start: None,
            end: None,
        },
    };

    let (logs, _guard) = capture_logs();
    let result = register_tf_file(&catalog, &descriptor).await;

    assert!(result.is_none());
    assert_eq!(logs.count("ERROR"), 1, "logs:\n{}", logs.contents());
}

#[tokio::test]
async fn test_notification_failure_is_swallowed() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    broker.fail_sends(true);
    let mut agent = env.agent(&catalog, &broker);

    let records = agent.process_stf_ready(&stf_ready("a.stf", 1000)).await;

    assert_eq!(records.len(), 2);
    let metrics = agent.metrics();
    assert_eq!(metrics.tf_files_created, 2);
    assert_eq!(metrics.notification_failures, 2);
}

// ============================================================================
// Receive loop
// ============================================================================

#[tokio::test]
async fn test_loop_drains_queue_until_closed() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new();
    broker.push_json(&stf_ready_json("run_1_a.stf", 1000));
    broker.push_frames(vec![b"epictopic".to_vec(), vec![0xFF; 16], b"{}".to_vec()]);
    broker.push_json(&stf_ready_json("run_1_b.stf", 1000));
    let mut agent = env.agent(&catalog, &broker);

    agent.run_message_driven().await.unwrap();

    assert_eq!(catalog.count(Method::Post, "/fastmon-files/"), 4);
    assert_eq!(broker.sent_of_type("tf_file_registered").len(), 4);

    let errors: Vec<_> = broker
        .sent_of_type("fastmon_status")
        .into_iter()
        .filter(|m| matches!(m, AgentMessage::FastmonStatus(s) if s.status == AgentStatus::Error))
        .collect();
    assert_eq!(errors.len(), 1, "malformed envelope reported once");
}

#[tokio::test]
async fn test_loop_stops_on_cancel() {
    let env = TestEnv::new();
    let catalog = MockCatalog::new();
    let broker = RecordingBroker::new().keep_open();
    let mut agent = env.agent(&catalog, &broker);

    let token = agent.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), agent.run_message_driven())
        .await
        .expect("loop should stop after cancel")
        .unwrap();
}
