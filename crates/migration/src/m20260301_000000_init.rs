//! Initial schema migration - creates all tables from scratch.
//!
//! Consolidated schema for the shared-expense ledger:
//!
//! - `users`: identity mirror (username + role)
//! - `groups`: owners of activities
//! - `group_managers`: group-level finance visibility
//! - `activities`: time-boxed events with lifecycle state
//! - `activity_managers`: per-activity manager grants
//! - `participants`: activity membership with split preferences
//! - `expenses`: ledger records, optionally activity-linked
//! - `splits`: per-participant shares of an expense
//! - `activity_logs`: append-only audit trail

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Role,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum GroupManagers {
    Table,
    GroupId,
    UserId,
}

#[derive(Iden)]
enum Activities {
    Table,
    Id,
    Name,
    StartDate,
    EndDate,
    Status,
    Enabled,
    IsLocked,
    SettlementDate,
    AllowSplit,
    BudgetCents,
    GroupId,
    CreatedBy,
}

#[derive(Iden)]
enum ActivityManagers {
    Table,
    ActivityId,
    UserId,
}

#[derive(Iden)]
enum Participants {
    Table,
    ActivityId,
    UserId,
    JoinedAt,
    SplitOption,
    IsActive,
    PartialExpenses,
    CanAdjustSplits,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    AmountCents,
    Kind,
    OccurredAt,
    Description,
    Category,
    ActivityId,
    GroupId,
    CreatedBy,
}

#[derive(Iden)]
enum Splits {
    Table,
    Id,
    ExpenseId,
    UserId,
    SplitType,
    SplitValueE4,
    CalculatedCents,
    IsAdjusted,
    AdjustedBy,
    AdjustedAt,
}

#[derive(Iden)]
enum ActivityLogs {
    Table,
    Id,
    ActivityId,
    Action,
    Description,
    Operator,
    Metadata,
    Timestamp,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Groups
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Group Managers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(GroupManagers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GroupManagers::GroupId).string().not_null())
                    .col(ColumnDef::new(GroupManagers::UserId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(GroupManagers::GroupId)
                            .col(GroupManagers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_managers-group_id")
                            .from(GroupManagers::Table, GroupManagers::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_managers-user_id")
                            .from(GroupManagers::Table, GroupManagers::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Activities
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activities::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activities::Name).string().not_null())
                    .col(ColumnDef::new(Activities::StartDate).timestamp().not_null())
                    .col(ColumnDef::new(Activities::EndDate).timestamp().not_null())
                    .col(ColumnDef::new(Activities::Status).string().not_null())
                    .col(ColumnDef::new(Activities::Enabled).boolean().not_null())
                    .col(ColumnDef::new(Activities::IsLocked).boolean().not_null())
                    .col(ColumnDef::new(Activities::SettlementDate).timestamp())
                    .col(ColumnDef::new(Activities::AllowSplit).boolean().not_null())
                    .col(ColumnDef::new(Activities::BudgetCents).big_integer())
                    .col(ColumnDef::new(Activities::GroupId).string().not_null())
                    .col(ColumnDef::new(Activities::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activities-group_id")
                            .from(Activities::Table, Activities::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activities-created_by")
                            .from(Activities::Table, Activities::CreatedBy)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-activities-status")
                    .table(Activities::Table)
                    .col(Activities::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-activities-start_date")
                    .table(Activities::Table)
                    .col(Activities::StartDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Activity Managers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ActivityManagers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityManagers::ActivityId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivityManagers::UserId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(ActivityManagers::ActivityId)
                            .col(ActivityManagers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity_managers-activity_id")
                            .from(ActivityManagers::Table, ActivityManagers::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity_managers-user_id")
                            .from(ActivityManagers::Table, ActivityManagers::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Participants
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Participants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Participants::ActivityId).string().not_null())
                    .col(ColumnDef::new(Participants::UserId).string().not_null())
                    .col(ColumnDef::new(Participants::JoinedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Participants::SplitOption)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Participants::IsActive).boolean().not_null())
                    .col(
                        ColumnDef::new(Participants::PartialExpenses)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Participants::CanAdjustSplits)
                            .boolean()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Participants::ActivityId)
                            .col(Participants::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-participants-activity_id")
                            .from(Participants::Table, Participants::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-participants-user_id")
                            .from(Participants::Table, Participants::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-participants-is_active")
                    .table(Participants::Table)
                    .col(Participants::IsActive)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Expenses::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::Kind).string().not_null())
                    .col(ColumnDef::new(Expenses::OccurredAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(ColumnDef::new(Expenses::Category).string())
                    .col(ColumnDef::new(Expenses::ActivityId).string())
                    .col(ColumnDef::new(Expenses::GroupId).string())
                    .col(ColumnDef::new(Expenses::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-activity_id")
                            .from(Expenses::Table, Expenses::ActivityId)
                            .to(Activities::Table, Activities::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-group_id")
                            .from(Expenses::Table, Expenses::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-created_by")
                            .from(Expenses::Table, Expenses::CreatedBy)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-occurred_at")
                    .table(Expenses::Table)
                    .col(Expenses::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-activity_id")
                    .table(Expenses::Table)
                    .col(Expenses::ActivityId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Splits
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Splits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Splits::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Splits::ExpenseId).string().not_null())
                    .col(ColumnDef::new(Splits::UserId).string().not_null())
                    .col(ColumnDef::new(Splits::SplitType).string().not_null())
                    .col(
                        ColumnDef::new(Splits::SplitValueE4)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Splits::CalculatedCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Splits::IsAdjusted).boolean().not_null())
                    .col(ColumnDef::new(Splits::AdjustedBy).string())
                    .col(ColumnDef::new(Splits::AdjustedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-splits-expense_id")
                            .from(Splits::Table, Splits::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-splits-user_id")
                            .from(Splits::Table, Splits::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-splits-expense_id-user_id-unique")
                    .table(Splits::Table)
                    .col(Splits::ExpenseId)
                    .col(Splits::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Activity Logs
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ActivityLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityLogs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActivityLogs::ActivityId).string().not_null())
                    .col(ColumnDef::new(ActivityLogs::Action).string().not_null())
                    .col(
                        ColumnDef::new(ActivityLogs::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivityLogs::Operator).string())
                    .col(ColumnDef::new(ActivityLogs::Metadata).string().not_null())
                    .col(
                        ColumnDef::new(ActivityLogs::Timestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity_logs-activity_id")
                            .from(ActivityLogs::Table, ActivityLogs::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-activity_logs-activity_id-timestamp")
                    .table(ActivityLogs::Table)
                    .col(ActivityLogs::ActivityId)
                    .col(ActivityLogs::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(ActivityLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Splits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Participants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivityManagers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Activities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupManagers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
