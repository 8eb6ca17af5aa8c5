//! Wallets and holdings surviving a restart on a SQLite file.

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use std::sync::Arc;
use swapvault::{
    Action, HoldingsLedger, KeyVault, MasterKey, SortBy, SqliteKeyStore, TokenHolding, VaultError,
};
use tempfile::tempdir;

fn database_url(dir: &std::path::Path) -> String {
    format!("sqlite:{}?mode=rwc", dir.join("swapvault.db").display())
}

#[tokio::test]
async fn test_wallet_survives_restart_with_same_master_key() {
    let dir = tempdir().unwrap();
    let url = database_url(dir.path());
    let master = MasterKey::generate();
    let encoded = master.to_base64();

    let public_key = {
        let store = Arc::new(SqliteKeyStore::new(&url, 1).await.unwrap());
        let vault = KeyVault::new(store, master);
        vault.create_wallet("alice").await.unwrap().public_key
    };

    let store = Arc::new(SqliteKeyStore::new(&url, 1).await.unwrap());
    let vault = KeyVault::new(store.clone(), MasterKey::from_base64(&encoded).unwrap());
    let signed_by = vault
        .with_decrypted_key("alice", |keypair| keypair.pubkey())
        .await
        .unwrap();
    assert_eq!(signed_by, public_key);
    assert_eq!(vault.public_key("alice").await.unwrap(), public_key);

    let wrong = KeyVault::new(store, MasterKey::generate());
    let result = wrong.with_decrypted_key("alice", |keypair| keypair.pubkey()).await;
    assert!(matches!(result, Err(VaultError::Crypto(_))));
}

#[tokio::test]
async fn test_holdings_share_the_key_store_database() {
    let dir = tempdir().unwrap();
    let url = database_url(dir.path());
    let store = SqliteKeyStore::new(&url, 2).await.unwrap();
    let ledger = HoldingsLedger::with_pool(store.pool().clone()).await.unwrap();

    for (symbol, value) in [("BONK", 12.0), ("WIF", 80.0), ("JUP", 40.0)] {
        ledger
            .add_holding(&TokenHolding {
                wallet_id: "alice".to_string(),
                mint: Pubkey::new_unique(),
                symbol: symbol.to_string(),
                value_usd: value,
                purchased_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let action: Action = "list_1_value".parse().unwrap();
    let Action::ListPage { page, sort_by } = action;
    assert_eq!(sort_by, SortBy::Value);

    let listing = ledger.list_page("alice", page, sort_by).await.unwrap();
    let symbols: Vec<_> = listing.holdings.iter().map(|h| h.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["WIF", "JUP", "BONK"]);
    assert!(!listing.has_next);
    assert_eq!(listing.action().next().encode(), "list_2_value");

    drop(ledger);
    drop(store);

    let reopened = HoldingsLedger::connect(&url, 1).await.unwrap();
    assert_eq!(
        reopened.list_page("alice", 1, SortBy::Date).await.unwrap().holdings.len(),
        3
    );
}
