use anyhow::Result;
use calsync_core::{AppError, SyncConfig};
use calsync_sync::EventMappingStore;

fn main() -> Result<()> {
    calsync_core::init()?;

    if let Err(e) = run() {
        tracing::error!("{}", e);
        eprintln!("calsync: {}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

/// Print the configured account and every record -> event mapping.
fn run() -> Result<(), AppError> {
    let (config, _) = SyncConfig::load_validated()?;

    println!("calsync - calendar event mappings");
    println!("  Config file:  {}", SyncConfig::config_path().display());
    println!("  Account:      {}", config.account.email);
    println!("  Default feed: {}", config.calendar.default_feed);
    println!("  Database:     {}", config.storage.database_path.display());

    let store = EventMappingStore::new(&config.storage.database_path)?;
    let mappings = store.list_mappings()?;

    if mappings.is_empty() {
        println!("\nNo records are mapped to calendar events yet.");
        return Ok(());
    }

    println!("\n{} mapping(s):", mappings.len());
    for mapping in &mappings {
        println!(
            "  {:<32} {} -> {}",
            mapping.owner().to_string(),
            mapping.feed_id,
            mapping.event_id
        );
    }

    Ok(())
}
