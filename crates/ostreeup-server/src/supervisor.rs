//! A small supervised-task runner: tasks report errors via plain
//! `thiserror` enums, so they are boxed behind `std::error::Error`
//! rather than a dedicated error-context crate.

use std::{error::Error, panic, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub type BoxedTaskErr = Box<dyn Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ShutdownErr {
    #[error("task failed while shutting down: {0}")]
    TaskFailed(BoxedTaskErr),

    #[error("timeout while waiting for a clean shutdown")]
    Timeout,
}

#[derive(Clone, Debug)]
pub struct TaskCfg {
    pub name: &'static str,
}

pub struct TaskCtx {
    shutdown: CancellationToken,
}

impl TaskCtx {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// CANCEL SAFETY: this future is cancel safe.
    pub async fn wait_shutdown(&self) {
        self.shutdown.cancelled().await
    }
}

pub trait SupervisedTask {
    fn cfg(&self) -> TaskCfg;
    fn run(self, ctx: TaskCtx) -> impl Future<Output = Result<(), BoxedTaskErr>> + Send;
}

#[derive(Default)]
pub struct Supervisor {
    shutdown: CancellationToken,
    tasks: JoinSet<(TaskCfg, Result<(), BoxedTaskErr>)>,
}

impl Supervisor {
    pub fn spawn<S: SupervisedTask + Send + 'static>(&mut self, task: S) {
        let cfg = task.cfg();
        let ctx = TaskCtx { shutdown: self.shutdown.child_token() };
        tracing::info!(task = cfg.name, "spawning supervised task");
        self.tasks.spawn(async move { (cfg, task.run(ctx).await) });
    }

    /// Supervises tasks until they all complete or one fails.
    /// CANCEL SAFETY: this future is cancel safe.
    pub async fn supervise(&mut self) -> Result<(), BoxedTaskErr> {
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok((cfg, Ok(()))) => {
                    tracing::info!(task = cfg.name, "task completed successfully");
                }
                Ok((cfg, Err(err))) => {
                    tracing::error!(task = cfg.name, %err, "task failed");
                    return Err(err);
                }
                Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
                Err(_) => panic!("supervised task was aborted"),
            }
        }
        Ok(())
    }

    pub async fn shutdown(&mut self, abort_timeout: Duration) -> Result<(), ShutdownErr> {
        self.shutdown.cancel();

        tokio::select! {
            result = self.supervise() => result.map_err(ShutdownErr::TaskFailed),
            () = tokio::time::sleep(abort_timeout) => {
                tracing::error!("tasks did not complete within timeout; aborting");
                self.tasks.abort_all();
                let _ = self.supervise().await;
                Err(ShutdownErr::Timeout)
            }
        }
    }
}
