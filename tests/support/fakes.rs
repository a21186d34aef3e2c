//! Fake collaborators for the session engine

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use mailsink::{
    error::StorageError,
    message::Message,
    smtp::{reply::Reply, status::Status},
    storage::Storage,
    traits::Interpreter,
};
use tokio::sync::mpsc;

/// Interpreter that records every buffer it is handed
///
/// Consumes one line per call and answers `250 <line>`, or `221 Bye` for
/// `QUIT`.
#[derive(Debug, Default, Clone)]
pub struct RecordingInterpreter {
    pub inputs: Arc<Mutex<Vec<Vec<u8>>>>,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl RecordingInterpreter {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn inputs(&self) -> Vec<Vec<u8>> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interpreter for RecordingInterpreter {
    fn start(&mut self) -> Reply {
        Reply::greeting("test.local")
    }

    async fn parse<'a>(&mut self, buffer: &'a [u8]) -> (&'a [u8], Option<Reply>) {
        self.inputs.lock().unwrap().push(buffer.to_vec());

        let Some(end) = buffer.windows(2).position(|window| window == b"\r\n") else {
            return (buffer, None);
        };

        let line = String::from_utf8_lossy(&buffer[..end]).into_owned();
        self.commands.lock().unwrap().push(line.clone());

        let reply = if line.eq_ignore_ascii_case("QUIT") {
            Reply::bye()
        } else {
            Reply::new(Status::Ok, line)
        };

        (&buffer[end + 2..], Some(reply))
    }
}

/// In-memory storage that can check, at store time, whether a notification
/// has already been published
#[derive(Debug, Default)]
pub struct RecordingStorage {
    pub stored: Mutex<Vec<Message>>,
    pub watch: Option<Arc<Mutex<mpsc::Receiver<Message>>>>,
    pub notified_before_store: AtomicUsize,
}

impl RecordingStorage {
    pub fn watching(receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Self {
        Self {
            watch: Some(receiver),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<Message> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn store(&self, message: &Message) -> Result<String, StorageError> {
        if let Some(receiver) = &self.watch {
            if !receiver.lock().unwrap().is_empty() {
                self.notified_before_store.fetch_add(1, Ordering::SeqCst);
            }
        }

        self.stored.lock().unwrap().push(message.clone());
        Ok(message.id.to_string())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.stored.lock().unwrap().len())
    }

    async fn list(&self, start: usize, limit: usize) -> Result<Vec<Message>, StorageError> {
        Ok(self.stored().into_iter().skip(start).take(limit).collect())
    }

    async fn load(&self, id: &str) -> Result<Message, StorageError> {
        self.stored()
            .into_iter()
            .find(|message| message.id.as_str() == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn delete_one(&self, id: &str) -> Result<(), StorageError> {
        let mut stored = self.stored.lock().unwrap();
        let before = stored.len();
        stored.retain(|message| message.id.as_str() != id);
        if stored.len() == before {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        self.stored.lock().unwrap().clear();
        Ok(())
    }
}

/// Storage that rejects every message
#[derive(Debug, Default)]
pub struct FailingStorage {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Storage for FailingStorage {
    async fn store(&self, _message: &Message) -> Result<String, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Internal("storage unavailable".to_string()))
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(0)
    }

    async fn list(&self, _start: usize, _limit: usize) -> Result<Vec<Message>, StorageError> {
        Ok(Vec::new())
    }

    async fn load(&self, id: &str) -> Result<Message, StorageError> {
        Err(StorageError::NotFound(id.to_string()))
    }

    async fn delete_one(&self, id: &str) -> Result<(), StorageError> {
        Err(StorageError::NotFound(id.to_string()))
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
