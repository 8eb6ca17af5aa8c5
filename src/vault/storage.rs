//! Storage abstraction for encrypted wallet keys.
//!
//! The vault only relies on single-key read/write atomicity, so any key-value
//! store can back it. Two implementations are provided: SQLite through sqlx and
//! an in-process map for tests and ephemeral runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::vault::types::EncryptedKeyRecord;

/// Formal contract for encrypted key persistence.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Stores a new record. Returns `false` without writing if the wallet id is taken.
    async fn put(&self, record: &EncryptedKeyRecord) -> Result<bool>;

    /// Fetches the record for a wallet, `None` if it does not exist.
    async fn get(&self, wallet_id: &str) -> Result<Option<EncryptedKeyRecord>>;

    /// Removes a record. Returns `false` if nothing was stored.
    async fn delete(&self, wallet_id: &str) -> Result<bool>;

    /// Health check for the storage backend.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(FromRow)]
struct WalletKeyRow {
    wallet_id: String,
    public_key: String,
    ciphertext: Vec<u8>,
    created_at: i64,
}

impl WalletKeyRow {
    fn into_record(self) -> Result<EncryptedKeyRecord> {
        let public_key = Pubkey::from_str(&self.public_key)
            .with_context(|| format!("Corrupt public key stored for wallet {}", self.wallet_id))?;
        Ok(EncryptedKeyRecord {
            wallet_id: self.wallet_id,
            public_key,
            ciphertext: self.ciphertext,
            created_at: self.created_at,
        })
    }
}

/// SQLite implementation of the KeyStore trait.
pub struct SqliteKeyStore {
    pool: Pool<Sqlite>,
}

impl SqliteKeyStore {
    /// Connect to the given database URL and create the schema if needed.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::create_schema(&pool).await?;

        info!("SqliteKeyStore initialized and connected to {}", database_url);

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection, since every
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:", 1).await
    }

    async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_keys (
                wallet_id TEXT PRIMARY KEY,
                public_key TEXT NOT NULL,
                ciphertext BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create wallet_keys table")?;

        Ok(())
    }

    /// Access to the pool, so other tables can share the database file.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn put(&self, record: &EncryptedKeyRecord) -> Result<bool> {
        debug!("Storing encrypted key for wallet: {}", record.wallet_id);

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO wallet_keys (wallet_id, public_key, ciphertext, created_at)
            VALUES (?, ?, ?, ?);
            "#,
        )
        .bind(&record.wallet_id)
        .bind(record.public_key.to_string())
        .bind(&record.ciphertext)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert wallet key")?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, wallet_id: &str) -> Result<Option<EncryptedKeyRecord>> {
        let row: Option<WalletKeyRow> = sqlx::query_as(
            "SELECT wallet_id, public_key, ciphertext, created_at FROM wallet_keys WHERE wallet_id = ?",
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch key for wallet {}", wallet_id))?;

        row.map(WalletKeyRow::into_record).transpose()
    }

    async fn delete(&self, wallet_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wallet_keys WHERE wallet_id = ?")
            .bind(wallet_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete key for wallet {}", wallet_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Key store health check failed")?;
        Ok(true)
    }
}

/// In-process KeyStore. Contents are lost on drop.
#[derive(Default)]
pub struct InMemoryKeyStore {
    records: RwLock<HashMap<String, EncryptedKeyRecord>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn put(&self, record: &EncryptedKeyRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.wallet_id) {
            return Ok(false);
        }
        records.insert(record.wallet_id.clone(), record.clone());
        Ok(true)
    }

    async fn get(&self, wallet_id: &str) -> Result<Option<EncryptedKeyRecord>> {
        Ok(self.records.read().await.get(wallet_id).cloned())
    }

    async fn delete(&self, wallet_id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(wallet_id).is_some())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
