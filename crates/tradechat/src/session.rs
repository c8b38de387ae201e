use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::models::message::Message;

/// Where conversation history lives between turns
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// History of a session, empty when the session is new
    async fn load(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Replace the stored history of a session
    async fn save(&self, session_id: &str, messages: &[Message]) -> Result<()>;
}

pub fn default_session_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home_dir.join(".config").join("tradechat").join("sessions"))
}

/// One jsonl file per session, a message per line
pub struct FileSessionStore {
    dir: PathBuf,
    // Saves of one session run one at a time
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    next_tmp: AtomicU64,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
            next_tmp: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_file(&self, session_id: &str) -> Result<PathBuf> {
        if session_id.is_empty() {
            return Err(anyhow!("session id must not be empty"));
        }
        Ok(self.dir.join(format!("{}.jsonl", encode_session_id(session_id))))
    }

    fn session_lock(&self, session_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow!("session lock table poisoned"))?;
        Ok(locks.entry(session_id.to_string()).or_default().clone())
    }
}

/// File name for a session id. Lowercase ascii letters, digits and `-` are
/// kept, every other byte becomes `_XX` hex, so distinct ids never share a
/// file, even on case-insensitive file systems.
fn encode_session_id(session_id: &str) -> String {
    let mut name = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("_{:02X}", byte));
        }
    }
    name
}

pub fn serialize_messages(messages: &[Message]) -> Result<String> {
    let mut out = String::new();
    for message in messages {
        out.push_str(&serde_json::to_string(message)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn deserialize_messages(contents: &str) -> Result<Vec<Message>> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Message>(line).map_err(anyhow::Error::from))
        .collect()
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        let path = self.session_file(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => deserialize_messages(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(anyhow!("Failed to read session file {}: {}", path.display(), e)),
        }
    }

    async fn save(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let path = self.session_file(session_id)?;
        let contents = serialize_messages(messages)?;
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Readers only ever see a complete file. Each save gets its own tmp
        // file so another process writing the same session cannot take it.
        let tmp = path.with_extension(format!(
            "jsonl.{}.{}.tmp",
            std::process::id(),
            self.next_tmp.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(anyhow!("Failed to write session file {}: {}", path.display(), e));
        }
        Ok(())
    }
}

/// Process-local history, lost on restart
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), messages.to_vec());
        Ok(())
    }
}
