//! One-time schema initialization shared by every run.

use log::info;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::store::{SchemaInitializer, SchemaStatus};
use crate::errors::Result;

/// Proof that the store schema exists.
///
/// Only [`StoreInitializer::ensure`] hands these out, and the loader requires
/// one, so no load can run before initialization has completed.
#[derive(Debug, Clone, Copy)]
pub struct SchemaReady {
    _private: (),
}

/// Runs the schema initializer at most once per process.
///
/// A failed initialization leaves the cell empty, so the next run (or the
/// next attempt of the same run) tries again.
pub struct StoreInitializer {
    schema: Arc<dyn SchemaInitializer>,
    status: OnceCell<SchemaStatus>,
}

impl StoreInitializer {
    pub fn new(schema: Arc<dyn SchemaInitializer>) -> Self {
        Self {
            schema,
            status: OnceCell::new(),
        }
    }

    /// Ensure the schema exists; later calls return immediately.
    pub async fn ensure(&self) -> Result<SchemaReady> {
        self.status
            .get_or_try_init(|| async {
                let status = self.schema.ensure_schema().await?;
                match status {
                    SchemaStatus::Created => info!("Created market data schema"),
                    SchemaStatus::AlreadyPresent => info!("Market data schema already present"),
                }
                Ok::<_, crate::errors::Error>(status)
            })
            .await?;
        Ok(SchemaReady { _private: () })
    }

    pub fn is_ready(&self) -> bool {
        self.status.initialized()
    }

    /// What the one completed initialization found.
    pub fn status(&self) -> Option<SchemaStatus> {
        self.status.get().copied()
    }
}
