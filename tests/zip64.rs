//! zip64 promotion tests.
//!
//! Size-driven promotion (4 GiB bodies) is covered by unit tests on the
//! record codecs; here the entry-count promotion path runs end to end,
//! since it only needs many small entries.

mod common;

use std::io::Write;

use zipup::codec::method;
use zipup::{Archive, EntryHeader, Updater, Writer};

/// One more entry than the 16-bit count field can hold.
const ENTRY_COUNT: usize = 0xFFFF + 1;

fn build_many_entries() -> Vec<u8> {
    let mut writer = Writer::create(Vec::new());
    for i in 0..ENTRY_COUNT {
        let mut header = EntryHeader::new(format!("e{i:05}"));
        header.method = method::STORE;
        let mut sink = writer.create_entry(header).unwrap();
        if i % 1000 == 0 {
            sink.write_all(format!("payload {i}").as_bytes()).unwrap();
        }
        sink.finish().unwrap();
    }
    let (result, bytes) = writer.finish_into_inner().unwrap();
    assert_eq!(result.entries_written, ENTRY_COUNT);
    bytes
}

#[test]
fn test_entry_count_promotion_round_trip() {
    let bytes = build_many_entries();
    let archive = Archive::open(bytes).unwrap();

    assert_eq!(archive.len(), ENTRY_COUNT);
    assert_eq!(archive.entries()[0].name(), "e00000");
    assert_eq!(
        archive.entries()[ENTRY_COUNT - 1].name(),
        format!("e{:05}", ENTRY_COUNT - 1)
    );
    assert_eq!(archive.read_to_vec("e01000").unwrap(), b"payload 1000");
    assert!(archive.read_to_vec("e00001").unwrap().is_empty());
}

#[test]
fn test_entry_count_promotion_survives_editing() {
    let bytes = build_many_entries();
    let mut updater = Updater::open(bytes).unwrap();
    assert_eq!(updater.len(), ENTRY_COUNT);

    updater.delete("e00000").unwrap();
    let mut sink = updater.create("tail.txt").unwrap();
    sink.write_all(b"appended past the 16-bit count").unwrap();
    sink.finish().unwrap();

    let mut saved = Vec::new();
    updater.save_as(&mut saved).unwrap();

    let archive = Archive::open(saved).unwrap();
    assert_eq!(archive.len(), ENTRY_COUNT); // one deleted, one added
    assert!(archive.entry("e00000").is_none());
    assert_eq!(
        archive.read_to_vec("tail.txt").unwrap(),
        b"appended past the 16-bit count"
    );
}
