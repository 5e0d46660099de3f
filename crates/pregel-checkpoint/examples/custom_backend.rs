//! A minimal custom `Checkpointer` backend, to show the shape downstream
//! integrators need to fill in for a durable store (SQL, object storage,
//! ...). This one keeps everything in a file-backed JSON blob instead of a
//! real database, which is enough to exercise the full trait without an
//! external dependency.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use pregel_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, Checkpointer, Result};
use serde_json::Value;

/// Loads the whole store into memory on every call and rewrites it on every
/// mutation. Fine for a demo; a real backend would index by thread and page
/// through results instead.
struct JsonFileCheckpointer {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCheckpointer {
    fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Vec<Checkpoint> {
        std::fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn write_all(&self, checkpoints: &[Checkpoint]) {
        let bytes = serde_json::to_vec(checkpoints).expect("checkpoints are always serializable");
        std::fs::write(&self.path, bytes).expect("writing the checkpoint store file");
    }
}

#[async_trait]
impl Checkpointer for JsonFileCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
        let _guard = self.lock.lock().unwrap();
        let mut all = self.read_all();
        let id = checkpoint.checkpoint_id.clone();
        all.push(checkpoint);
        self.write_all(&all);
        Ok(id)
    }

    async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_all().into_iter().find(|c| c.checkpoint_id == checkpoint_id))
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_all().into_iter().filter(|c| c.thread_id == thread_id).last())
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<CheckpointMetadata>> {
        let _guard = self.lock.lock().unwrap();
        let mut metadata: Vec<CheckpointMetadata> = self
            .read_all()
            .into_iter()
            .filter(|c| c.thread_id == thread_id)
            .rev()
            .map(|c| c.metadata)
            .collect();
        if let Some(limit) = limit {
            metadata.truncate(limit);
        }
        Ok(metadata)
    }

    async fn delete(&self, checkpoint_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap();
        let mut all = self.read_all();
        let before = all.len();
        all.retain(|c| c.checkpoint_id != checkpoint_id);
        let removed = all.len() != before;
        self.write_all(&all);
        Ok(removed)
    }

    async fn delete_by_thread(&self, thread_id: &str) -> Result<usize> {
        let _guard = self.lock.lock().unwrap();
        let mut all = self.read_all();
        let before = all.len();
        all.retain(|c| c.thread_id != thread_id);
        let removed = before - all.len();
        self.write_all(&all);
        Ok(removed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::temp_dir().join("pregel-rt-custom-backend-example.json");
    let _ = std::fs::remove_file(&path);
    let backend = JsonFileCheckpointer::new(path.clone());

    let checkpoint = Checkpoint::new(
        "demo-thread",
        0,
        HashMap::new(),
        Value::Null,
        CheckpointMetadata {
            source: CheckpointSource::Input,
            step_number: 0,
            executed_nodes: Vec::new(),
            parent_checkpoint_id: None,
            tags: HashMap::new(),
        },
    );
    backend.save(checkpoint).await?;

    let latest = backend.load_latest("demo-thread").await?;
    println!("latest checkpoint for demo-thread: {latest:?}");

    let _ = std::fs::remove_file(&path);
    Ok(())
}
