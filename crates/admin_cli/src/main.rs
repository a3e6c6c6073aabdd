use std::error::Error;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use ledger::{
    Amount, BusinessClock, Channel, CloseDayCmd, Direction, ExternalPostingCmd, Ledger,
    LedgerError, MovementKind, OpeningBalanceCmd, RecordCmd, Reference, ReferenceKind,
    TransferCmd,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cambio_admin")]
#[command(about = "Admin utilities for the cambio ledger (balances, reconciliation, closings)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./cambio.db?mode=rwc")]
    database_url: String,

    /// IANA timezone used to bucket business days.
    #[arg(long, env = "CAMBIO_TIMEZONE", default_value = "UTC")]
    timezone: String,

    /// Recorded as the actor of every write.
    #[arg(long, env = "CAMBIO_ACTOR", default_value = "admin")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign the opening balance of a pair.
    Opening(PairAmountArgs),
    /// Record a single movement.
    Record(RecordArgs),
    /// Show cached and projected balance of a pair.
    Balance(PairArgs),
    /// List the movements of a pair.
    Movements(PairArgs),
    /// Reconcile one pair, or every currency of a location with `--all`.
    Reconcile(ReconcileArgs),
    /// Print every pair whose cached balance drifted, as JSON.
    Report,
    /// Move money of one currency between two locations.
    Transfer(TransferArgs),
    /// Post an external-service cashflow.
    External(ExternalArgs),
    /// Close a business day at a location.
    CloseDay(CloseDayArgs),
}

#[derive(Args, Debug)]
struct PairArgs {
    #[arg(long)]
    location: String,
    #[arg(long)]
    currency: String,
}

#[derive(Args, Debug)]
struct PairAmountArgs {
    #[command(flatten)]
    pair: PairArgs,
    #[arg(long)]
    amount: Amount,
}

#[derive(Args, Debug)]
struct RecordArgs {
    #[command(flatten)]
    pair: PairArgs,
    #[arg(long)]
    kind: MovementKind,
    /// Magnitude; signed for adjustments.
    #[arg(long, allow_hyphen_values = true)]
    amount: Amount,
    #[arg(long, default_value = "manual_adjustment")]
    reference_kind: String,
    #[arg(long)]
    reference_id: String,
    #[arg(long, default_value = "cash")]
    channel: Channel,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    #[arg(long)]
    location: String,
    #[arg(long, required_unless_present = "all")]
    currency: Option<String>,
    #[arg(long, conflicts_with = "currency")]
    all: bool,
}

#[derive(Args, Debug)]
struct TransferArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    currency: String,
    #[arg(long)]
    amount: Amount,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Debug)]
struct ExternalArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    service: String,
    #[command(flatten)]
    pair: PairArgs,
    #[arg(long, value_parser = parse_direction)]
    direction: Direction,
    #[arg(long)]
    amount: Amount,
    #[arg(long, default_value = "cash")]
    channel: Channel,
}

#[derive(Args, Debug)]
struct CloseDayArgs {
    #[arg(long)]
    location: String,
    /// Business day as `YYYY-MM-DD`; today in `--timezone` when omitted.
    #[arg(long)]
    day: Option<NaiveDate>,
    /// Counted amount as `CURRENCY=AMOUNT`; repeat per currency.
    #[arg(long = "count", value_parser = parse_count)]
    counts: Vec<(String, Amount)>,
}

fn parse_direction(raw: &str) -> Result<Direction, String> {
    match raw {
        "inflow" | "in" => Ok(Direction::Inflow),
        "outflow" | "out" => Ok(Direction::Outflow),
        other => Err(format!("unsupported direction: {other}")),
    }
}

fn parse_count(raw: &str) -> Result<(String, Amount), String> {
    let (currency, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CURRENCY=AMOUNT, got {raw}"))?;
    let amount = amount.parse::<Amount>().map_err(|err| err.to_string())?;
    Ok((currency.trim().to_string(), amount))
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report a ledger error the way an operator should see it and exit.
fn fail(err: LedgerError) -> ! {
    tracing::debug!("{err:?}");
    eprintln!("{}", err.public_message());
    std::process::exit(exit_code(&err));
}

/// Storage and contention failures may succeed on retry; anything else is a
/// rejected request.
fn exit_code(err: &LedgerError) -> i32 {
    match err {
        LedgerError::Database(_) | LedgerError::ConcurrentModification(_) => 1,
        _ => 2,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ledger=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let clock = BusinessClock::from_name(&cli.timezone).unwrap_or_else(|err| fail(err));
    let db = connect_db(&cli.database_url).await?;
    let ledger = Ledger::builder().database(db).clock(clock).build().await?;
    let actor = cli.actor;

    match cli.command {
        Command::Opening(args) => {
            let cmd = OpeningBalanceCmd::new(
                args.pair.location,
                args.pair.currency,
                args.amount,
                actor.as_str(),
            );
            let opening = ledger
                .assign_opening_balance(cmd)
                .await
                .unwrap_or_else(|err| fail(err));
            println!(
                "opening balance {}/{} = {}",
                opening.key.location_id, opening.key.currency_id, opening.amount
            );
        }
        Command::Record(args) => {
            let reference = Reference::new(
                ReferenceKind::from(args.reference_kind.as_str()),
                args.reference_id,
            );
            let mut cmd = RecordCmd::new(
                args.pair.location,
                args.pair.currency,
                args.kind,
                args.amount,
                actor.as_str(),
                reference,
                Utc::now(),
            )
            .channel(args.channel);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            let entry = ledger.record(cmd).await.unwrap_or_else(|err| fail(err));
            println!(
                "recorded {} {} at {}/{} (balance {} -> {})",
                entry.kind,
                entry.signed_amount,
                entry.location_id,
                entry.currency_id,
                entry.snapshot().before,
                entry.snapshot().after
            );
        }
        Command::Balance(args) => {
            let cached = ledger
                .cached_balance(&args.location, &args.currency)
                .await
                .unwrap_or_else(|err| fail(err));
            let projected = ledger
                .project(&args.location, &args.currency, None)
                .await
                .unwrap_or_else(|err| fail(err));
            println!("{}", cached.key);
            println!("  cached:    {}", cached.quantity);
            println!("    cash:    {}", cached.cash_quantity);
            println!("    bank:    {}", cached.bank_quantity);
            println!("  projected: {projected}");
            if !cached.quantity.within_tolerance(projected) {
                match cached.quantity.checked_sub(projected) {
                    Some(drift) => println!("  drift:     {drift}"),
                    None => println!("  drift:     out of range"),
                }
            }
        }
        Command::Movements(args) => {
            let entries = ledger
                .movements(&args.location, &args.currency)
                .await
                .unwrap_or_else(|err| fail(err));
            print_json(&entries)?;
        }
        Command::Reconcile(args) => match args.currency {
            Some(currency) if !args.all => {
                let outcome = ledger
                    .reconcile(&args.location, &currency, &actor)
                    .await
                    .unwrap_or_else(|err| fail(err));
                print_json(&outcome)?;
            }
            _ => {
                let outcomes = ledger
                    .reconcile_all(&args.location, &actor)
                    .await
                    .unwrap_or_else(|err| fail(err));
                let mut failed = false;
                for outcome in outcomes {
                    match outcome.result {
                        Ok(reconciliation) => println!(
                            "{}: previous {} projected {} corrected {}",
                            outcome.currency_id,
                            reconciliation.previous_cached,
                            reconciliation.projected,
                            reconciliation.corrected
                        ),
                        Err(err) => {
                            failed = true;
                            eprintln!("{}: {}", outcome.currency_id, err.public_message());
                        }
                    }
                }
                if failed {
                    std::process::exit(1);
                }
            }
        },
        Command::Report => {
            let report = ledger
                .build_inconsistency_report()
                .await
                .unwrap_or_else(|err| fail(err));
            print_json(&report)?;
        }
        Command::Transfer(args) => {
            let mut cmd = TransferCmd::new(
                args.id,
                args.from,
                args.to,
                args.currency,
                args.amount,
                actor.as_str(),
                Utc::now(),
            );
            if let Some(note) = args.note {
                cmd = cmd.note(note);
            }
            let receipt = ledger
                .settle_transfer(cmd)
                .await
                .unwrap_or_else(|err| fail(err));
            print_json(&receipt)?;
        }
        Command::External(args) => {
            let cmd = ExternalPostingCmd::new(
                args.id,
                args.service,
                args.pair.location,
                args.pair.currency,
                args.direction,
                args.amount,
                actor.as_str(),
                Utc::now(),
            )
            .channel(args.channel);
            let entry = ledger
                .post_external(cmd)
                .await
                .unwrap_or_else(|err| fail(err));
            print_json(&entry)?;
        }
        Command::CloseDay(args) => {
            let day = args.day.unwrap_or_else(|| ledger.clock().today());
            let cmd = args.counts.into_iter().fold(
                CloseDayCmd::new(args.location, day, actor.as_str()),
                |cmd, (currency, amount)| cmd.counted(currency, amount),
            );
            let closing = ledger.close_day(cmd).await.unwrap_or_else(|err| fail(err));
            print_json(&closing)?;
        }
    }

    Ok(())
}
