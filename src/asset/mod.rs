//! Asset module
//!
//! An [`Asset`] is the local file being uploaded. It keeps the file open for
//! its whole lifetime and owns the [`PartitionStore`] that the upload
//! pipeline fills in.
//!
//! # Example
//!
//! ```no_run
//! use asset_uploadr::asset::{Asset, Partition};
//!
//! # async fn example() -> asset_uploadr::Result<()> {
//! let allowed = vec!["image/jpeg".to_string()];
//! let mut asset = Asset::open("photo.jpg", &allowed)?;
//!
//! asset.set_partition(Partition::new(1, "https://storage.example/p1", 0, 1024)).await?;
//! assert_eq!(asset.partition_ids(), vec![1]);
//!
//! asset.close();
//! # Ok(())
//! # }
//! ```

pub mod mime;
mod partition;
mod store;

pub use partition::Partition;
pub use store::PartitionStore;

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The file being uploaded
#[derive(Debug)]
pub struct Asset {
    /// Identifier assigned by the remote service after metadata creation
    pub id: Option<String>,
    pub filename: PathBuf,
    pub size: u64,
    pub mime_type: String,
    /// Upload session grouping all partitions until confirmation
    pub upload_id: Option<String>,

    file: Option<Arc<File>>,
    partitions: PartitionStore,
}

impl Asset {
    /// Open and validate the file at `path`
    ///
    /// Fails when the file cannot be stat'ed or opened, is empty, is not a
    /// regular file, or its MIME type is not in `allowed_mime_types`.
    pub fn open<P: AsRef<Path>>(path: P, allowed_mime_types: &[String]) -> Result<Self> {
        let path = path.as_ref();

        let meta = std::fs::metadata(path)
            .map_err(|e| Error::io(format!("could not stat file {}", path.display()), e))?;
        if !meta.is_file() {
            return Err(Error::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if meta.len() == 0 {
            return Err(Error::Validation(format!("{} is empty", path.display())));
        }

        let mime = mime::from_path(path).unwrap_or("");
        if !allowed_mime_types.iter().any(|m| m == mime) {
            return Err(Error::Validation(format!(
                "mime type '{}' is not uploadable",
                mime
            )));
        }

        let file = File::open(path).map_err(|e| Error::io("could not open file", e))?;

        Ok(Self {
            id: None,
            filename: path.to_path_buf(),
            size: meta.len(),
            mime_type: mime.to_string(),
            upload_id: None,
            file: Some(Arc::new(file)),
            partitions: PartitionStore::new(),
        })
    }

    /// File name without directories, as registered with the remote service
    pub fn base_name(&self) -> String {
        self.filename
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Known partition ids, ascending
    pub fn partition_ids(&self) -> Vec<i64> {
        self.partitions.ids()
    }

    pub fn partition(&self, id: i64) -> Result<Partition> {
        self.partitions
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("no partition found with id {}", id)))
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Read the partition's byte range from the file and store it
    ///
    /// The read completes before the store's write lock is taken.
    pub async fn set_partition(&self, mut part: Partition) -> Result<()> {
        if part.id < 1 {
            return Err(Error::Validation(format!(
                "cannot set partition with non-positive id {}",
                part.id
            )));
        }
        if part.end <= part.start {
            return Err(Error::Validation(format!(
                "partition #{} has empty byte range {}..{}",
                part.id, part.start, part.end
            )));
        }

        let file = self.file.clone().ok_or_else(|| {
            Error::io(
                "failed to read part of file",
                io::Error::other("asset file is closed"),
            )
        })?;

        let (start, len) = (part.start, part.len());
        let contents = tokio::task::spawn_blocking(move || read_range(&file, start, len))
            .await
            .map_err(|e| Error::io("failed to read part of file", io::Error::other(e)))?
            .map_err(|e| {
                Error::io(
                    format!("failed to read bytes {}..{} of file", part.start, part.end),
                    e,
                )
            })?;

        part.set_contents(contents);
        self.partitions.set(part);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Release the file handle
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!(file = %self.filename.display(), "Closed asset file");
        }
    }
}

/// Positional read of exactly `len` bytes starting at `offset`
fn read_range(file: &File, offset: u64, len: u64) -> io::Result<Bytes> {
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
    let mut buf = vec![0u8; len];

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(&mut buf, offset)?;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < len {
            let n = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            filled += n;
        }
    }

    Ok(Bytes::from(buf))
}
