// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::error::RecordError;
use crate::record::{peek_index, EventRecord, HEADER_LEN, RECORD_MAGIC};

#[test]
fn test_envelope_layout() {
    let bytes = EventRecord::new(0x0102, b"door_open".to_vec()).encode();
    assert_eq!(bytes.len(), HEADER_LEN + 9);
    assert_eq!(bytes[0], RECORD_MAGIC);
    assert_eq!(bytes[1], 1);
    assert_eq!(&bytes[2..10], &0x0102i64.to_le_bytes());
    assert_eq!(&bytes[10..14], &9u32.to_le_bytes());
    assert_eq!(&bytes[14..], b"door_open");

    let decoded = EventRecord::decode(&bytes).unwrap();
    assert_eq!(decoded.index, 0x0102);
    assert_eq!(decoded.payload, b"door_open".to_vec());
}

#[test]
fn test_opaque_records_have_no_index() {
    assert_eq!(peek_index(b"{\"legacy\":true}"), None);
    assert_eq!(peek_index(&[]), None);
    assert_eq!(EventRecord::decode(b"plain"), Err(RecordError::NotEnveloped));
}

#[test]
fn test_truncated_and_unknown_version() {
    let mut bytes = EventRecord::new(5, vec![1, 2, 3]).encode();
    bytes.pop();
    assert_eq!(
        EventRecord::decode(&bytes),
        Err(RecordError::Truncated { declared: 3, found: 2 })
    );

    assert!(matches!(
        EventRecord::decode(&[RECORD_MAGIC, 1, 0]),
        Err(RecordError::Truncated { .. })
    ));

    let mut future = EventRecord::new(5, vec![]).encode();
    future[1] = 9;
    assert_eq!(EventRecord::decode(&future), Err(RecordError::Version(9)));
}

#[test]
fn test_negative_and_empty_payload() {
    let bytes = EventRecord::new(-1, Vec::new()).encode();
    assert_eq!(bytes.len(), HEADER_LEN);
    assert_eq!(peek_index(&bytes), Some(-1));
}
