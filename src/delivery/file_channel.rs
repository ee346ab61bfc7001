//! JSON-lines outbox channel
//!
//! Each feed is a file in the outbox directory (`main.jsonl`,
//! `restricted.jsonl`) with one [`PostedRecord`] per line. Another process
//! (a chat bridge, a static site generator) consumes the files.

use crate::delivery::channel::{ChannelResult, DeliveryChannel, PostedRecord, Receipt};
use crate::state::{CatalogEntry, FeedTarget};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Delivery channel appending to per-feed JSON-lines files
pub struct FileChannel {
    directory: PathBuf,
    search_window: usize,
    /// Serializes appends from this process
    write_lock: Mutex<()>,
}

impl FileChannel {
    pub fn new(directory: impl Into<PathBuf>, search_window: usize) -> Self {
        Self {
            directory: directory.into(),
            search_window,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the outbox file for a feed
    pub fn feed_path(&self, target: FeedTarget) -> PathBuf {
        self.directory.join(format!("{}.jsonl", target))
    }
}

#[async_trait]
impl DeliveryChannel for FileChannel {
    async fn post(&self, entry: &CatalogEntry, target: FeedTarget) -> ChannelResult<()> {
        let mut line = serde_json::to_string(&PostedRecord::new(entry))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.directory).await?;

        let path = self.feed_path(target);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;

        tracing::debug!("Appended entry {} to {}", entry.id, path.display());
        Ok(())
    }

    async fn find(&self, entry_id: &str, target: FeedTarget) -> ChannelResult<Option<Receipt>> {
        let path = self.feed_path(target);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(find_in_lines(&content, entry_id, self.search_window, &path))
    }
}

/// Searches the last `window` lines, newest first
fn find_in_lines(content: &str, entry_id: &str, window: usize, path: &Path) -> Option<Receipt> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(window);

    lines[start..]
        .iter()
        .enumerate()
        .rev()
        .find_map(|(offset, line)| {
            let record: PostedRecord = serde_json::from_str(line).ok()?;
            (record.entry_id == entry_id).then(|| Receipt {
                entry_id: record.entry_id,
                reference: format!("{}:{}", path.display(), start + offset + 1),
            })
        })
}
