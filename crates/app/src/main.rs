use std::time::Duration;

use ledger::{BusinessClock, Ledger};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "cambio={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let clock = BusinessClock::from_name(&settings.ledger.timezone)?;
    let ledger = Ledger::builder().database(db).clock(clock).build().await?;
    tracing::info!(timezone = %settings.ledger.timezone, "ledger ready");

    if let Some(reconciliation) = settings.reconciliation {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            tracing::info!(
                interval_secs = reconciliation.interval_secs,
                "Found reconciliation settings..."
            );
            let mut ticker =
                tokio::time::interval(Duration::from_secs(reconciliation.interval_secs.max(1)));
            loop {
                ticker.tick().await;
                sweep(&ledger, &reconciliation.actor_id).await;
            }
        });
    }

    tasks.spawn(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {err}");
        }
        tracing::info!("shutting down");
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

/// One pass of `reconcile_all` over every location holding a cached balance.
async fn sweep(ledger: &Ledger, actor_id: &str) {
    let locations = match ledger.tracked_locations().await {
        Ok(locations) => locations,
        Err(err) => {
            tracing::error!("failed to list tracked locations: {err}");
            return;
        }
    };

    let mut corrected = 0usize;
    let mut failed = 0usize;
    for location_id in &locations {
        match ledger.reconcile_all(location_id, actor_id).await {
            Ok(outcomes) => {
                for outcome in outcomes {
                    match outcome.result {
                        Ok(reconciliation) if reconciliation.corrected => corrected += 1,
                        Ok(_) => {}
                        Err(_) => failed += 1,
                    }
                }
            }
            Err(err) => {
                failed += 1;
                tracing::error!(%location_id, "reconciliation sweep failed: {err}");
            }
        }
    }

    tracing::info!(
        locations = locations.len(),
        corrected,
        failed,
        "reconciliation sweep finished"
    );
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
