//! Property-based tests for writer/reader/updater round trips.

mod common;

use std::io::Write;

use proptest::prelude::*;
use zipup::codec::method;
use zipup::{Archive, EntryHeader, Updater, Writer};

/// Random entry sets with unique names and arbitrary binary content.
fn entry_set() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::btree_map(
        "[a-z][a-z0-9_]{0,11}",
        prop::collection::vec(any::<u8>(), 0..512),
        0..10,
    )
    .prop_map(|map| map.into_iter().collect())
}

/// Picks a compression method per entry index.
fn method_for(index: usize) -> u16 {
    #[cfg(feature = "deflate")]
    {
        if index % 2 == 0 {
            method::STORE
        } else {
            method::DEFLATE
        }
    }
    #[cfg(not(feature = "deflate"))]
    {
        let _ = index;
        method::STORE
    }
}

fn build_archive(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = Writer::create(Vec::new());
    for (i, (name, data)) in entries.iter().enumerate() {
        let mut header = EntryHeader::new(name.clone());
        header.method = method_for(i);
        let mut sink = writer.create_entry(header).unwrap();
        sink.write_all(data).unwrap();
        sink.finish().unwrap();
    }
    let (_, bytes) = writer.finish_into_inner().unwrap();
    bytes
}

fn assert_matches_model(archive_bytes: &[u8], model: &[(String, Vec<u8>)]) {
    let archive = Archive::open(archive_bytes.to_vec()).unwrap();
    let names: Vec<&str> = archive.entries().iter().map(|e| e.name()).collect();
    let expected: Vec<&str> = model.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, expected);
    for (name, data) in model {
        assert_eq!(&archive.read_to_vec(name).unwrap(), data, "entry '{name}'");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_writer_reader_round_trip(entries in entry_set()) {
        let bytes = build_archive(&entries);
        assert_matches_model(&bytes, &entries);
    }

    #[test]
    fn prop_unmodified_save_preserves_archive(entries in entry_set()) {
        let bytes = build_archive(&entries);
        let updater = Updater::open(bytes).unwrap();
        let mut saved = Vec::new();
        updater.save_as(&mut saved).unwrap();
        assert_matches_model(&saved, &entries);

        // Raw copy preserves every declared header value.
        let reopened = Archive::open(saved).unwrap();
        for (i, (name, _)) in entries.iter().enumerate() {
            let header = reopened.entry(name).unwrap().header();
            prop_assert_eq!(header.method, method_for(i));
        }
    }

    #[test]
    fn prop_mutations_match_model(
        entries in entry_set(),
        delete_mask in any::<u64>(),
        new_content in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let bytes = build_archive(&entries);
        let mut updater = Updater::open(bytes).unwrap();

        // Delete a pseudo-random subset, then create one fresh entry.
        let mut model: Vec<(String, Vec<u8>)> = Vec::new();
        for (i, (name, data)) in entries.iter().enumerate() {
            if delete_mask & (1 << (i % 64)) != 0 {
                updater.delete(name).unwrap();
            } else {
                model.push((name.clone(), data.clone()));
            }
        }
        let mut sink = updater.create("Z-created").unwrap();
        sink.write_all(&new_content).unwrap();
        sink.finish().unwrap();
        model.push(("Z-created".to_string(), new_content.clone()));

        let mut saved = Vec::new();
        updater.save_as(&mut saved).unwrap();
        assert_matches_model(&saved, &model);
    }
}
