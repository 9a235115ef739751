//! Unit of work: one SQLite transaction plus the callbacks that may only run
//! once it has committed.

use crate::error::SubcastError;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

pub type PostCommitHook = Box<dyn FnOnce() -> Result<(), SubcastError> + Send>;

pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    on_commit: Vec<PostCommitHook>,
}

impl UnitOfWork {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, SubcastError> {
        let tx = pool.begin().await?;
        Ok(Self {
            tx,
            on_commit: Vec::new(),
        })
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Registers `hook` to run after a successful commit. Hooks run in
    /// registration order and are dropped on rollback.
    pub fn on_commit<F>(&mut self, hook: F)
    where
        F: FnOnce() -> Result<(), SubcastError> + Send + 'static,
    {
        self.on_commit.push(Box::new(hook));
    }

    pub fn pending_hooks(&self) -> usize {
        self.on_commit.len()
    }

    /// Commits the transaction, then runs the post-commit hooks. A failing
    /// hook stops the remaining ones; the data is already committed.
    pub async fn commit(self) -> Result<(), SubcastError> {
        let Self { tx, on_commit } = self;
        tx.commit().await?;
        debug!(hooks = on_commit.len(), "unit of work committed");
        for hook in on_commit {
            hook()?;
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), SubcastError> {
        let Self { tx, on_commit } = self;
        debug!(discarded_hooks = on_commit.len(), "unit of work rolled back");
        tx.rollback().await?;
        Ok(())
    }
}
