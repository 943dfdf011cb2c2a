//! Upload partitions
//!
//! A partition is a contiguous byte range of an asset that is transferred as
//! an independent unit to its own pre-signed URL.

use bytes::Bytes;

/// A segment of the asset that can be uploaded separately from the others
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Part number assigned by the remote service (must be positive)
    pub id: i64,
    /// Pre-signed destination URL
    pub url: String,
    /// Confirmation tag returned by the storage endpoint, empty until uploaded
    pub etag: String,
    /// First byte of the range
    pub start: u64,
    /// End of the range (exclusive)
    pub end: u64,
    contents: Option<Bytes>,
}

impl Partition {
    pub fn new(id: i64, url: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            id,
            url: url.into(),
            etag: String::new(),
            start,
            end,
            contents: None,
        }
    }

    /// Number of bytes covered by the range
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of the range, present once the partition went through the store
    pub fn contents(&self) -> Option<&Bytes> {
        self.contents.as_ref()
    }

    pub fn is_uploaded(&self) -> bool {
        !self.etag.is_empty()
    }

    pub(crate) fn set_contents(&mut self, contents: Bytes) {
        self.contents = Some(contents);
    }
}
