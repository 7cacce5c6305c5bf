//! Fetch the pokedex collection into a local SQLite file and print sync
//! progress, standing in for the UI layer.
//!
//! ```sh
//! cargo run --example sync_pokedex
//! ```

use anyhow::Result;
use pokedex_sync::{EntryStore, HttpTransport, SqliteEntryStore, SyncConfig, SyncService, SyncState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pokedex_sync=info".into()),
        )
        .init();

    let store = SqliteEntryStore::new("sqlite:pokedex.db?mode=rwc").await?;
    let service = SyncService::spawn(
        SyncConfig::default(),
        HttpTransport::new(),
        store.clone(),
    );

    let mut state = service.subscribe();
    loop {
        let current = state.borrow_and_update().clone();
        match current {
            SyncState::Loading => println!("syncing..."),
            SyncState::Ready => {
                let count = store.entry_count().await?;
                println!("pokedex up to date ({count} entries)");

                if let Some(first) = store.list_entries().await?.into_iter().next() {
                    println!("prefetching details for {}", first.name);
                    service.fetch_entry_details(&first);
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
                break;
            }
            SyncState::Failed { error, retry } => {
                eprintln!("sync failed: {error}");
                eprint!("retry? [y/N] ");
                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;
                if answer.trim().eq_ignore_ascii_case("y") {
                    retry.retry();
                } else {
                    break;
                }
            }
        }

        if state.changed().await.is_err() {
            break;
        }
    }

    Ok(())
}
