//! Thread-safe parser pool for tree-sitter parsers
//!
//! Tree-sitter parsers are not Send + Sync, so parsing happens on
//! dedicated worker threads fed through a channel. One analysis run
//! spawns many per-file tasks against one shared pool.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tree_sitter::{Parser, Tree};

use crate::languages::LanguageSpec;

/// A parsing request sent to the pool.
struct WorkerRequest {
    spec: &'static LanguageSpec,
    content: String,
    response: mpsc::Sender<Result<Tree>>,
}

/// Channel-fed pool of parser threads.
pub struct ParserPool {
    sender: mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    /// Create a pool with the given number of worker threads.
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..num_workers.max(1) {
            let receiver = Arc::clone(&receiver);
            std::thread::spawn(move || Self::worker_thread(worker_id, receiver));
        }

        Self { sender }
    }

    fn worker_thread(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkerRequest>>>) {
        tracing::debug!("parser worker {worker_id} started");

        let mut parser = Parser::new();

        loop {
            let request = {
                let guard = receiver.lock().expect("parser pool receiver poisoned");
                guard.recv()
            };
            let request = match request {
                Ok(req) => req,
                Err(_) => {
                    tracing::debug!("parser worker {worker_id} shutting down");
                    break;
                }
            };

            if let Err(e) = parser.set_language(&request.spec.grammar()) {
                let _ = request
                    .response
                    .send(Err(anyhow::anyhow!("failed to set language: {e}")));
                continue;
            }

            let result = match parser.parse(&request.content, None) {
                Some(tree) => Ok(tree),
                None => Err(anyhow::anyhow!("parser produced no tree")),
            };

            if request.response.send(result).is_err() {
                tracing::warn!("parse result receiver dropped before delivery");
            }
        }
    }

    /// Parse synchronously, blocking the current thread.
    pub fn parse_blocking(&self, spec: &'static LanguageSpec, content: String) -> Result<Tree> {
        let (response, receiver) = mpsc::channel();
        self.sender
            .send(WorkerRequest {
                spec,
                content,
                response,
            })
            .map_err(|_| anyhow::anyhow!("parser pool is shut down"))?;
        receiver
            .recv()
            .map_err(|_| anyhow::anyhow!("parser worker died"))?
    }

    /// Parse from async context without blocking the runtime.
    pub async fn parse(&self, spec: &'static LanguageSpec, content: String) -> Result<Tree> {
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || {
            let (response, receiver) = mpsc::channel();
            sender
                .send(WorkerRequest {
                    spec,
                    content,
                    response,
                })
                .map_err(|_| anyhow::anyhow!("parser pool is shut down"))?;
            receiver
                .recv()
                .map_err(|_| anyhow::anyhow!("parser worker died"))?
        })
        .await
        .map_err(|e| anyhow::anyhow!("task join error: {e}"))?
    }
}

impl Clone for ParserPool {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Pool sized to available parallelism, with a floor of two workers.
pub fn create_parser_pool(workers: usize) -> ParserPool {
    let num_workers = if workers > 0 {
        workers
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get().max(2))
            .unwrap_or(2)
    };
    ParserPool::new(num_workers)
}
