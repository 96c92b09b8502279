use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::NodeError;

struct ServiceTask {
    handle: JoinHandle<()>,
    kill_switch: Arc<AtomicBool>,
}

impl ServiceTask {
    fn is_running(&self) -> bool {
        !self.handle.is_finished() && !self.kill_switch.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Default)]
/// The lifecycle of a single background service task.
///
/// Every spawned task gets its own kill switch, a task which has been
/// told to stop can never be revived by a later start.
pub(crate) struct ServiceHandle {
    task: Arc<Mutex<Option<ServiceTask>>>,
}

impl ServiceHandle {
    /// Spawns the service unless a live, non-stopped task already exists.
    ///
    /// A task still winding down after a stop is left to exit on its own.
    pub(crate) fn start<F, Fut>(&self, service: F)
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = self.task.lock();
        if task.as_ref().map(ServiceTask::is_running).unwrap_or(false) {
            return;
        }

        let kill_switch = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(service(kill_switch.clone()));
        *task = Some(ServiceTask {
            handle,
            kill_switch,
        });
    }

    /// Tells the running task to exit on its next tick.
    pub(crate) fn stop(&self, name: &'static str) -> Result<(), NodeError> {
        let task = self.task.lock();
        match task.as_ref() {
            Some(task) if task.is_running() => {
                task.kill_switch.store(true, Ordering::Relaxed);
                Ok(())
            },
            _ => Err(NodeError::NotRunning(name)),
        }
    }

    /// Waits for the most recently spawned task to exit.
    pub(crate) async fn wait(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.handle.await;
        }
    }
}
