//! Wire Compatibility Tests
//!
//! Field names and envelope layout are consumed by the monitor service and the
//! terminal client. These tests pin them down.

use chrono::Utc;
use fastmon_protocol::*;
use serde_json::json;

/// Header layout: 16 bytes, big-endian, [VER:1][FLAGS:1][RES:2][SEQ:8][LEN:4]
#[test]
fn test_header_byte_layout() {
    let header = Header::new(0x0102030405060708, 0x0A0B0C0D);
    let packed = header.pack().unwrap();

    assert_eq!(packed.len(), 16, "Header must be exactly 16 bytes");
    assert_eq!(packed[0], ENVELOPE_VERSION);
    assert_eq!(packed[1], 0, "flags");
    assert_eq!(&packed[2..4], &[0, 0], "reserved");
    assert_eq!(&packed[4..12], &[1, 2, 3, 4, 5, 6, 7, 8], "sequence");
    assert_eq!(&packed[12..16], &[0x0A, 0x0B, 0x0C, 0x0D], "payload length");
}

#[test]
fn test_tf_file_registered_field_names() {
    let msg = AgentMessage::TfFileRegistered(TfFileRegistered {
        processed_by: "fastmon-agent".to_string(),
        tf_file_id: Some(RecordId::from("tf-uuid")),
        tf_filename: "run_42_data_tf_001.tf".to_string(),
        file_size_bytes: 150_000,
        stf_filename: Some("run_42_data.stf".to_string()),
        run_number: Some(RecordId::Int(42)),
        status: FileStatus::Registered,
        timestamp: Utc::now(),
        message: "TF file run_42_data_tf_001.tf registered for fast monitoring".to_string(),
    });

    let value = serde_json::to_value(&msg).unwrap();
    let object = value.as_object().unwrap();

    for key in [
        "msg_type",
        "processed_by",
        "tf_file_id",
        "tf_filename",
        "file_size_bytes",
        "stf_filename",
        "run_number",
        "status",
        "timestamp",
        "message",
    ] {
        assert!(object.contains_key(key), "missing field {}", key);
    }
    assert_eq!(value["msg_type"], "tf_file_registered");
    assert_eq!(value["status"], "registered");
    assert_eq!(value["run_number"], 42);
}

#[test]
fn test_stf_ready_from_data_agent() {
    // Shape published by the data agent, including fields we do not model.
    let payload = json!({
        "msg_type": "stf_ready",
        "filename": "swf.20250801.000001.stf",
        "file_id": "5b0e1f54-9b7e-4c1c-9f0a-3d5a8f5a1e20",
        "run_id": 100042,
        "file_url": "file:///data/swf.20250801.000001.stf",
        "checksum": "ad:12345678",
        "size_bytes": 734003200,
        "start": "20250801000001",
        "end": "20250801000101",
        "state": "physics",
        "substate": "running",
        "workflow_id": 17,
        "simulation_tick": 3,
    });

    let bytes = serde_json::to_vec(&payload).unwrap();
    let envelope = Envelope::new("epictopic", 1, bytes).unwrap();
    let frames = envelope.pack().unwrap();
    let decoded = Envelope::unpack(&frames).unwrap();

    match InboundMessage::parse(&decoded.payload).unwrap() {
        InboundMessage::StfReady(stf) => {
            assert_eq!(stf.run_id, Some(RecordId::Int(100042)));
            assert_eq!(stf.workflow_id, Some(RecordId::Int(17)));
            assert_eq!(stf.size_bytes, Some(734_003_200));
            assert_eq!(stf.state.as_deref(), Some("physics"));
        }
        other => panic!("expected stf_ready, got {:?}", other),
    }
}

#[test]
fn test_stage_output_shape() {
    let patch = WorkflowStagePatch {
        status: WorkflowStageStatus::FastmonComplete,
        started_at: None,
        completed_at: Some(Utc::now()),
        output_message: Some(StageOutput {
            tf_files_created: 2,
            tf_filenames: vec!["a_tf_001.tf".to_string(), "a_tf_002.tf".to_string()],
        }),
    };

    let value = serde_json::to_value(&patch).unwrap();
    assert_eq!(value["status"], "fastmon_complete");
    assert_eq!(value["output_message"]["tf_files_created"], 2);
    assert_eq!(value["output_message"]["tf_filenames"][1], "a_tf_002.tf");
    assert!(value.get("started_at").is_none());
    assert!(value.get("completed_at").is_some());
}
