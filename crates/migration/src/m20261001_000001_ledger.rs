//! Ledger schema.
//!
//! - `movements`: append-only log of balance changes per (location, currency)
//! - `cached_balances`: running balance per pair, derived from the log
//! - `opening_balances`: assigned starting balances, latest active one wins
//! - `daily_closings`: one frozen line per (location, currency, business day)

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Movements {
    Table,
    Id,
    LocationId,
    CurrencyId,
    Kind,
    SignedAmount,
    BalanceBefore,
    BalanceAfter,
    ReferenceKind,
    ReferenceId,
    Channel,
    Description,
    ActorId,
    OccurredAt,
    RecordedAt,
}

#[derive(Iden)]
enum CachedBalances {
    Table,
    LocationId,
    CurrencyId,
    Quantity,
    CashQuantity,
    BankQuantity,
    Version,
    UpdatedAt,
    ReconciledAt,
    ReconciledBy,
}

#[derive(Iden)]
enum OpeningBalances {
    Table,
    Id,
    LocationId,
    CurrencyId,
    Amount,
    AssignedAt,
    AssignedBy,
    Active,
}

#[derive(Iden)]
enum DailyClosings {
    Table,
    Id,
    LocationId,
    CurrencyId,
    BusinessDay,
    Opening,
    Inflows,
    Outflows,
    Expected,
    Counted,
    Closing,
    AdjustmentMovementId,
    ClosedBy,
    ClosedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Movements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Movements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Movements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Movements::LocationId).string().not_null())
                    .col(ColumnDef::new(Movements::CurrencyId).string().not_null())
                    .col(ColumnDef::new(Movements::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Movements::SignedAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Movements::BalanceBefore)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Movements::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Movements::ReferenceKind).string().not_null())
                    .col(ColumnDef::new(Movements::ReferenceId).string().not_null())
                    .col(
                        ColumnDef::new(Movements::Channel)
                            .string()
                            .not_null()
                            .default("cash"),
                    )
                    .col(ColumnDef::new(Movements::Description).string())
                    .col(ColumnDef::new(Movements::ActorId).string().not_null())
                    .col(ColumnDef::new(Movements::OccurredAt).timestamp().not_null())
                    .col(ColumnDef::new(Movements::RecordedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-movements-location_id-currency_id-occurred_at")
                    .table(Movements::Table)
                    .col(Movements::LocationId)
                    .col(Movements::CurrencyId)
                    .col(Movements::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-movements-reference_kind-reference_id")
                    .table(Movements::Table)
                    .col(Movements::ReferenceKind)
                    .col(Movements::ReferenceId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Cached balances
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CachedBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CachedBalances::LocationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CachedBalances::CurrencyId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CachedBalances::Quantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CachedBalances::CashQuantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CachedBalances::BankQuantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CachedBalances::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(CachedBalances::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CachedBalances::ReconciledAt).timestamp())
                    .col(ColumnDef::new(CachedBalances::ReconciledBy).string())
                    .primary_key(
                        Index::create()
                            .col(CachedBalances::LocationId)
                            .col(CachedBalances::CurrencyId),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Opening balances
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(OpeningBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OpeningBalances::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OpeningBalances::LocationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OpeningBalances::CurrencyId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OpeningBalances::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(OpeningBalances::AssignedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OpeningBalances::AssignedBy)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OpeningBalances::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-opening_balances-location_id-currency_id-active")
                    .table(OpeningBalances::Table)
                    .col(OpeningBalances::LocationId)
                    .col(OpeningBalances::CurrencyId)
                    .col(OpeningBalances::Active)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Daily closings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(DailyClosings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyClosings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyClosings::LocationId).string().not_null())
                    .col(ColumnDef::new(DailyClosings::CurrencyId).string().not_null())
                    .col(
                        ColumnDef::new(DailyClosings::BusinessDay)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DailyClosings::Opening).big_integer().not_null())
                    .col(ColumnDef::new(DailyClosings::Inflows).big_integer().not_null())
                    .col(ColumnDef::new(DailyClosings::Outflows).big_integer().not_null())
                    .col(ColumnDef::new(DailyClosings::Expected).big_integer().not_null())
                    .col(ColumnDef::new(DailyClosings::Counted).big_integer())
                    .col(ColumnDef::new(DailyClosings::Closing).big_integer().not_null())
                    .col(ColumnDef::new(DailyClosings::AdjustmentMovementId).string())
                    .col(ColumnDef::new(DailyClosings::ClosedBy).string().not_null())
                    .col(ColumnDef::new(DailyClosings::ClosedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-daily_closings-adjustment_movement_id")
                            .from(DailyClosings::Table, DailyClosings::AdjustmentMovementId)
                            .to(Movements::Table, Movements::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-daily_closings-location_id-currency_id-business_day")
                    .table(DailyClosings::Table)
                    .col(DailyClosings::LocationId)
                    .col(DailyClosings::CurrencyId)
                    .col(DailyClosings::BusinessDay)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(DailyClosings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OpeningBalances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CachedBalances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Movements::Table).to_owned())
            .await?;
        Ok(())
    }
}
