//! Testable Property 4 (spec §8): BinaryPlacer's three-tier decision tree,
//! driven against fake `BlobStore`/`DataStore` implementations so call
//! counts and the on-wire sentinel can both be checked.

mod support;

use bundle_codec::binary::{
    read_binary, write_binary, PlacedBinary, StoreHandles, BINARY_IN_BLOB_STORE, BINARY_IN_DATA_STORE,
};
use bundle_codec::config::CodecConfig;
use std::io::Cursor;
use support::{FakeBlobStore, FakeDataStore};

fn read_leading_i32(buf: &[u8]) -> i32 {
    i32::from_be_bytes(buf[0..4].try_into().unwrap())
}

#[test]
fn below_data_store_threshold_is_inlined() {
    let config = CodecConfig::default();
    let mut data_store = FakeDataStore::new(128);
    let payload = vec![1u8; 64];

    let mut buf = Vec::new();
    {
        let mut stores = StoreHandles {
            data_store: Some(&mut data_store),
            blob_store: None,
        };
        write_binary(&mut buf, &payload, None, &config, &mut stores).unwrap();
    }

    assert_eq!(read_leading_i32(&buf), payload.len() as i32, "inline length word");
    assert_eq!(data_store.store_calls, 0);

    let mut cursor = Cursor::new(buf);
    let mut stores = StoreHandles {
        data_store: Some(&mut data_store),
        blob_store: None,
    };
    let placed = read_binary(&mut cursor, &config, &mut stores).unwrap();
    assert_eq!(placed, PlacedBinary::Inline(payload));
}

#[test]
fn at_or_above_data_store_threshold_goes_to_the_data_store_exactly_once() {
    let config = CodecConfig::default();
    let mut data_store = FakeDataStore::new(128);
    let payload = vec![2u8; 256];

    let mut buf = Vec::new();
    {
        let mut stores = StoreHandles {
            data_store: Some(&mut data_store),
            blob_store: None,
        };
        write_binary(&mut buf, &payload, None, &config, &mut stores).unwrap();
    }

    assert_eq!(read_leading_i32(&buf), BINARY_IN_DATA_STORE);
    assert_eq!(data_store.store_calls, 1);

    let mut cursor = Cursor::new(buf);
    let mut stores = StoreHandles {
        data_store: Some(&mut data_store),
        blob_store: None,
    };
    let placed = read_binary(&mut cursor, &config, &mut stores).unwrap();
    assert_eq!(placed, PlacedBinary::Inline(payload));
}

#[test]
fn over_min_blob_size_with_only_a_blob_store_offloads_exactly_once() {
    let config = CodecConfig {
        min_blob_size: 16,
        ..Default::default()
    };
    let mut blob_store = FakeBlobStore::default();
    let payload = vec![3u8; 64];

    let mut buf = Vec::new();
    {
        let mut stores = StoreHandles {
            data_store: None,
            blob_store: Some(&mut blob_store),
        };
        let returned_id = write_binary(&mut buf, &payload, None, &config, &mut stores).unwrap();
        assert!(returned_id.is_some(), "blob-backed writes report their id");
    }

    assert_eq!(read_leading_i32(&buf), BINARY_IN_BLOB_STORE);
    assert_eq!(blob_store.create_calls, 1);
    assert_eq!(blob_store.put_calls, 1);

    let mut cursor = Cursor::new(buf);
    let mut stores = StoreHandles {
        data_store: None,
        blob_store: Some(&mut blob_store),
    };
    let placed = read_binary(&mut cursor, &config, &mut stores).unwrap();
    assert_eq!(placed, PlacedBinary::Inline(payload));
    assert_eq!(blob_store.get_calls, 1);
}

#[test]
fn at_or_below_min_blob_size_with_only_a_blob_store_is_inlined() {
    let config = CodecConfig {
        min_blob_size: 64,
        ..Default::default()
    };
    let payload = vec![4u8; 64];

    let mut buf = Vec::new();
    let mut stores = StoreHandles::none();
    write_binary(&mut buf, &payload, None, &config, &mut stores).unwrap();

    assert_eq!(read_leading_i32(&buf), payload.len() as i32);

    let mut cursor = Cursor::new(buf);
    let mut stores = StoreHandles::none();
    let placed = read_binary(&mut cursor, &config, &mut stores).unwrap();
    assert_eq!(placed, PlacedBinary::Inline(payload));
}

#[test]
fn rewriting_a_blob_backed_value_reuses_its_existing_id() {
    let config = CodecConfig {
        min_blob_size: 8,
        ..Default::default()
    };
    let mut blob_store = FakeBlobStore::default();
    let payload = vec![5u8; 32];

    let first_id = {
        let mut buf = Vec::new();
        let mut stores = StoreHandles {
            data_store: None,
            blob_store: Some(&mut blob_store),
        };
        write_binary(&mut buf, &payload, None, &config, &mut stores)
            .unwrap()
            .unwrap()
    };
    assert_eq!(blob_store.create_calls, 1);

    let mut buf = Vec::new();
    {
        let mut stores = StoreHandles {
            data_store: None,
            blob_store: Some(&mut blob_store),
        };
        let second_id = write_binary(&mut buf, &payload, Some(&first_id), &config, &mut stores)
            .unwrap()
            .unwrap();
        assert_eq!(second_id, first_id);
    }
    assert_eq!(blob_store.create_calls, 1, "no fresh id was minted on rewrite");
    assert_eq!(blob_store.put_calls, 2, "but the bytes were re-put under the same id");
}
