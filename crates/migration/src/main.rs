use sea_orm::Database;
use sea_orm_migration::prelude::*;

use migration::Migrator;

const USAGE: &str = "usage: migration [up [N] | down [N] | fresh | refresh | reset | status]

Database: DATABASE_URL, else the sqlite path in CAMBIO__DATABASE__SQLITE,
else ./cambio.db.";

/// What a run of the migrator does to the ledger schema.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    /// Apply pending migrations, all of them when no step count is given.
    Up(Option<u32>),
    /// Roll back applied migrations, only the last one by default.
    Down(Option<u32>),
    /// Drop every table, then apply everything.
    Fresh,
    /// Roll back everything, then apply everything.
    Refresh,
    /// Roll back everything.
    Reset,
    Status,
}

fn parse_action<I: IntoIterator<Item = String>>(args: I) -> Result<Action, String> {
    let mut args = args.into_iter();
    let command = args.next();
    let steps = match args.next() {
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| format!("step count must be a positive integer, got {raw}"))?,
        ),
        None => None,
    };
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument {extra}"));
    }

    let action = match (command.as_deref().unwrap_or("up"), steps) {
        ("up", steps) => Action::Up(steps),
        ("down", steps) => Action::Down(steps.or(Some(1))),
        ("fresh", None) => Action::Fresh,
        ("refresh", None) => Action::Refresh,
        ("reset", None) => Action::Reset,
        ("status", None) => Action::Status,
        (name @ ("fresh" | "refresh" | "reset" | "status"), Some(_)) => {
            return Err(format!("{name} takes no step count"));
        }
        (other, _) => return Err(format!("unknown command {other}")),
    };
    if matches!(action, Action::Up(Some(0)) | Action::Down(Some(0))) {
        return Err("step count must be a positive integer, got 0".to_string());
    }
    Ok(action)
}

/// Same database the service opens by default.
fn database_url() -> String {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return url;
    }
    let path =
        std::env::var("CAMBIO__DATABASE__SQLITE").unwrap_or_else(|_| "./cambio.db".to_string());
    format!("sqlite:{path}?mode=rwc")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let action = match parse_action(std::env::args().skip(1)) {
        Ok(action) => action,
        Err(reason) => {
            eprintln!("{reason}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let db = Database::connect(&database_url()).await?;

    match action {
        Action::Up(steps) => Migrator::up(&db, steps).await?,
        Action::Down(steps) => Migrator::down(&db, steps).await?,
        Action::Fresh => Migrator::fresh(&db).await?,
        Action::Refresh => Migrator::refresh(&db).await?,
        Action::Reset => Migrator::reset(&db).await?,
        Action::Status => Migrator::status(&db).await?,
    }

    let pending = Migrator::get_pending_migrations(&db).await?.len();
    println!("{action:?} done, {pending} migration(s) pending");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Action, String> {
        parse_action(args.iter().map(|arg| ToString::to_string(arg)))
    }

    #[test]
    fn defaults_to_applying_everything() {
        assert_eq!(parse(&[]), Ok(Action::Up(None)));
        assert_eq!(parse(&["up"]), Ok(Action::Up(None)));
        assert_eq!(parse(&["up", "2"]), Ok(Action::Up(Some(2))));
    }

    #[test]
    fn down_rolls_back_one_step_by_default() {
        assert_eq!(parse(&["down"]), Ok(Action::Down(Some(1))));
        assert_eq!(parse(&["down", "3"]), Ok(Action::Down(Some(3))));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&["sideways"]).is_err());
        assert!(parse(&["up", "many"]).is_err());
        assert!(parse(&["down", "0"]).is_err());
        assert!(parse(&["status", "1"]).is_err());
        assert!(parse(&["up", "1", "2"]).is_err());
        assert_eq!(parse(&["reset"]), Ok(Action::Reset));
    }
}
