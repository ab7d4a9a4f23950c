use crate::domain::models::Transaction;
use crate::domain::repository::TransactionRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Append-only; rows are never updated or deleted.
#[derive(Clone)]
pub struct InMemoryTransactionRepository {
    storage: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryTransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.id, user_id = %transaction.user_id))]
    async fn insert(&self, transaction: Transaction) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.push(transaction);
        debug!(rows = storage.len(), "Transaction inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let storage = self.storage.read().await;
        // Reverse insertion order first so rows sharing a timestamp keep newest-first.
        let mut rows: Vec<Transaction> = storage
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
