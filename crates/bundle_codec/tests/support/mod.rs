//! Fake `BlobStore`/`DataStore` implementations shared by the integration
//! tests, playing the role of the persistence manager's real backing stores
//! (spec §1, "Out of scope ... the blob store ... the content-addressed
//! data store").

use std::collections::HashMap;
use std::io::Read;

use bundle_codec::error::BlobError;
use bundle_codec::stores::{BlobStore, DataStore};

#[derive(Default)]
pub struct FakeBlobStore {
    next_id: u64,
    blobs: HashMap<String, Vec<u8>>,
    pub create_calls: u32,
    pub put_calls: u32,
    pub get_calls: u32,
}

impl BlobStore for FakeBlobStore {
    fn create_id(&mut self) -> Result<String, BlobError> {
        self.create_calls += 1;
        self.next_id += 1;
        Ok(format!("blob-{}", self.next_id))
    }

    fn put(&mut self, id: &str, bytes: &[u8]) -> Result<(), BlobError> {
        self.put_calls += 1;
        self.blobs.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&mut self, id: &str) -> Result<Vec<u8>, BlobError> {
        self.get_calls += 1;
        self.blobs.get(id).cloned().ok_or(BlobError::MissingBlob)
    }

    fn remove(&mut self, id: &str) -> Result<(), BlobError> {
        self.blobs.remove(id);
        Ok(())
    }
}

pub struct FakeDataStore {
    min_record_length: u64,
    next_id: u64,
    contents: HashMap<String, Vec<u8>>,
    pub store_calls: u32,
}

impl FakeDataStore {
    pub fn new(min_record_length: u64) -> Self {
        Self {
            min_record_length,
            next_id: 0,
            contents: HashMap::new(),
            store_calls: 0,
        }
    }
}

impl DataStore for FakeDataStore {
    fn min_record_length(&self) -> u64 {
        self.min_record_length
    }

    fn store(&mut self, stream: &mut dyn Read) -> std::io::Result<String> {
        self.store_calls += 1;
        self.next_id += 1;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        let id = format!("content-{}", self.next_id);
        self.contents.insert(id.clone(), buf);
        Ok(id)
    }

    fn open_stream(&mut self, id: &str) -> std::io::Result<Box<dyn Read + '_>> {
        let bytes = self
            .contents
            .get(id)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "unknown content id"))?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }
}
