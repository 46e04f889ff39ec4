use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// Detached work that must finish before the process exits. Tasks run on the
/// runtime the set was created on, not on the caller's.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
    runtime: Option<Handle>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Arc::default(),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                tracing::error!(error.cause_chain = ?e, "Background task failed");
            }
        }
        match &self.runtime {
            Some(runtime) => tasks.spawn_on(task, runtime),
            None => tasks.spawn(task),
        };
    }

    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for every task spawned so far, including ones spawned while
    /// draining.
    pub async fn drain(&self) {
        loop {
            let mut current = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *tasks)
            };
            if current.is_empty() {
                return;
            }
            tracing::info!(pending = current.len(), "Waiting for background tasks");
            while let Some(finished) = current.join_next().await {
                if let Err(e) = finished {
                    tracing::error!(error.cause_chain = ?e, "Background task failed");
                }
            }
        }
    }
}
