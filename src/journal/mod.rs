use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod attempts;
mod migrations;

use attempts::mark_interrupted;
use migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Owns the journal thread. Dropping the last handle closes the job queue;
/// the thread drains what is queued and exits before the drop returns.
struct JournalThread {
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JournalThread {
    fn submit(&self, job: Job) -> Result<()> {
        let jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let sender = jobs.as_ref().ok_or_else(|| anyhow!("attempt journal is closed"))?;
        sender
            .send(job)
            .map_err(|_| anyhow!("attempt journal thread has stopped"))
    }
}

impl Drop for JournalThread {
    fn drop(&mut self) {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Attempt journal thread panicked");
            }
        }
    }
}

/// Opens the database and gets it ready for this run: WAL, schema, and
/// attempts a crashed run left open marked `Interrupted`.
fn prepare(path: &Path) -> Result<(Connection, usize)> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open attempt journal {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Attempt journal stays in rollback mode: {err}");
    }
    run_migrations(&mut conn).context("failed to migrate attempt journal")?;
    let recovered = mark_interrupted(&conn, Utc::now())?;

    Ok((conn, recovered))
}

/// Local SQLite log of capture attempts. The connection lives on its own
/// thread; async callers queue closures and await the reply.
#[derive(Clone)]
pub struct AttemptJournal {
    thread: Arc<JournalThread>,
    path: Arc<PathBuf>,
    recovered: usize,
}

impl AttemptJournal {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create journal directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<usize>>();
        let thread_path = path.clone();

        let handle = thread::Builder::new()
            .name("scanmark-journal".into())
            .spawn(move || {
                let mut conn = match prepare(&thread_path) {
                    Ok((conn, recovered)) => {
                        if ready_tx.send(Ok(recovered)).is_err() {
                            return;
                        }
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in jobs_rx {
                    job(&mut conn);
                }
            })
            .context("failed to spawn journal thread")?;

        let recovered = ready_rx
            .recv()
            .context("journal thread exited before it was ready")??;

        info!("Attempt journal opened at {}", path.display());

        Ok(Self {
            thread: Arc::new(JournalThread {
                jobs: Mutex::new(Some(jobs_tx)),
                handle: Mutex::new(Some(handle)),
            }),
            path: Arc::new(path),
            recovered,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many unfinished attempts were marked `Interrupted` on open.
    pub fn recovered_on_open(&self) -> usize {
        self.recovered
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.thread.submit(Box::new(move |conn| {
            // A dropped receiver means the caller stopped waiting.
            let _ = reply_tx.send(task(conn));
        }))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("attempt journal dropped the request"))?
    }
}
