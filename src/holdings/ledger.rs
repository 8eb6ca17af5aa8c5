//! HoldingsLedger - per-wallet token holdings with paged listing.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use solana_sdk::pubkey::Pubkey;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::{debug, info};

use crate::holdings::action::{Action, SortBy};

pub const PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenHolding {
    pub wallet_id: String,
    pub mint: Pubkey,
    pub symbol: String,
    pub value_usd: f64,
    pub purchased_at: DateTime<Utc>,
}

/// One page of a wallet's holdings.
#[derive(Debug, Clone)]
pub struct HoldingsPage {
    pub holdings: Vec<TokenHolding>,
    pub page: u32,
    pub sort_by: SortBy,
    pub has_next: bool,
}

impl HoldingsPage {
    pub fn action(&self) -> Action {
        Action::list(self.page, self.sort_by)
    }

    /// Plain-text rendering for chat replies.
    pub fn render(&self) -> String {
        if self.holdings.is_empty() {
            return "No tokens found.".to_string();
        }
        let mut out = String::from("Your tokens:\n\n");
        for h in &self.holdings {
            let _ = write!(
                out,
                "Symbol: {}\nValue: ${:.2}\nPurchase Date: {}\n\n",
                h.symbol,
                h.value_usd,
                h.purchased_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        out
    }
}

#[derive(FromRow)]
struct HoldingRow {
    wallet_id: String,
    mint: String,
    symbol: String,
    value_usd: f64,
    purchased_at: i64,
}

impl HoldingRow {
    fn into_holding(self) -> Result<TokenHolding> {
        let mint = Pubkey::from_str(&self.mint)
            .with_context(|| format!("Corrupt mint stored for wallet {}", self.wallet_id))?;
        let purchased_at = Utc
            .timestamp_millis_opt(self.purchased_at)
            .single()
            .with_context(|| format!("Corrupt purchase time for {}", self.mint))?;
        Ok(TokenHolding {
            wallet_id: self.wallet_id,
            mint,
            symbol: self.symbol,
            value_usd: self.value_usd,
            purchased_at,
        })
    }
}

pub struct HoldingsLedger {
    pool: Pool<Sqlite>,
}

impl HoldingsLedger {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to SQLite database")?;
        Self::with_pool(pool).await
    }

    /// Share an existing pool, e.g. the one backing the key store.
    pub async fn with_pool(pool: Pool<Sqlite>) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS holdings (
                wallet_id TEXT NOT NULL,
                mint TEXT NOT NULL,
                symbol TEXT NOT NULL,
                value_usd REAL NOT NULL,
                purchased_at INTEGER NOT NULL,
                PRIMARY KEY (wallet_id, mint)
            );
            CREATE INDEX IF NOT EXISTS idx_holdings_value ON holdings(wallet_id, value_usd DESC);
            CREATE INDEX IF NOT EXISTS idx_holdings_date ON holdings(wallet_id, purchased_at DESC);
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create holdings table")?;

        info!("HoldingsLedger initialized");
        Ok(Self { pool })
    }

    /// Insert or replace the holding for `(wallet_id, mint)`.
    pub async fn add_holding(&self, holding: &TokenHolding) -> Result<()> {
        debug!("Recording holding {} for wallet {}", holding.symbol, holding.wallet_id);
        sqlx::query(
            r#"
            INSERT INTO holdings (wallet_id, mint, symbol, value_usd, purchased_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(wallet_id, mint) DO UPDATE SET
                symbol = excluded.symbol,
                value_usd = excluded.value_usd,
                purchased_at = excluded.purchased_at;
            "#,
        )
        .bind(&holding.wallet_id)
        .bind(holding.mint.to_string())
        .bind(&holding.symbol)
        .bind(holding.value_usd)
        .bind(holding.purchased_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to upsert holding")?;
        Ok(())
    }

    pub async fn remove_holding(&self, wallet_id: &str, mint: &Pubkey) -> Result<bool> {
        let result = sqlx::query("DELETE FROM holdings WHERE wallet_id = ? AND mint = ?")
            .bind(wallet_id)
            .bind(mint.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete holding")?;
        Ok(result.rows_affected() > 0)
    }

    /// Page `page` (1-based, 0 treated as 1) of `PAGE_SIZE` holdings.
    pub async fn list_page(&self, wallet_id: &str, page: u32, sort_by: SortBy) -> Result<HoldingsPage> {
        let page = page.max(1);
        let order = match sort_by {
            SortBy::Value => "value_usd DESC, purchased_at DESC",
            SortBy::Date => "purchased_at DESC, value_usd DESC",
        };
        let sql = format!(
            "SELECT wallet_id, mint, symbol, value_usd, purchased_at FROM holdings \
             WHERE wallet_id = ? ORDER BY {}, mint LIMIT ? OFFSET ?",
            order
        );
        let offset = i64::from(page - 1) * i64::from(PAGE_SIZE);

        // One extra row tells us whether a next page exists
        let rows: Vec<HoldingRow> = sqlx::query_as(&sql)
            .bind(wallet_id)
            .bind(i64::from(PAGE_SIZE) + 1)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list holdings for wallet {}", wallet_id))?;

        let has_next = rows.len() > PAGE_SIZE as usize;
        let holdings = rows
            .into_iter()
            .take(PAGE_SIZE as usize)
            .map(HoldingRow::into_holding)
            .collect::<Result<Vec<_>>>()?;

        Ok(HoldingsPage {
            holdings,
            page,
            sort_by,
            has_next,
        })
    }
}
