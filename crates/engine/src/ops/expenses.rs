use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ActionType, EngineError, Expense, ExpenseKind, MoneyCents, ResultEngine, Split,
    SplitInstruction, expenses, policy,
    policy::{Actor, ActivityCtx},
    split, splits,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

/// Caller-supplied fields for a new expense.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseDraft {
    pub amount: MoneyCents,
    pub kind: ExpenseKind,
    pub occurred_at: DateTime<Utc>,
    pub description: String,
    pub category: Option<String>,
    pub activity_id: Option<Uuid>,
    pub group_id: Option<String>,
}

impl Engine {
    async fn persist_splits(
        &self,
        db: &DatabaseTransaction,
        batch: &[Split],
    ) -> ResultEngine<()> {
        for split in batch {
            splits::ActiveModel::from(split).insert(db).await?;
        }
        Ok(())
    }

    async fn delete_expense_splits(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<()> {
        splits::Entity::delete_many()
            .filter(splits::Column::ExpenseId.eq(expense_id.to_string()))
            .exec(db)
            .await?;
        Ok(())
    }

    async fn load_splits(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<Vec<Split>> {
        splits::Entity::find()
            .filter(splits::Column::ExpenseId.eq(expense_id.to_string()))
            .order_by_asc(splits::Column::UserId)
            .all(db)
            .await?
            .into_iter()
            .map(Split::try_from)
            .collect()
    }

    /// True when any persisted split of the expense was last adjusted by
    /// someone who manages the activity. Delegated participants are frozen
    /// out once that happens.
    async fn splits_locked_by_manager(
        &self,
        db: &DatabaseTransaction,
        ctx: &ActivityCtx,
        existing: &[Split],
    ) -> ResultEngine<bool> {
        let adjusters: BTreeSet<&str> = existing
            .iter()
            .filter_map(|s| s.adjusted_by.as_deref())
            .collect();
        for adjuster in adjusters {
            let Some(actor) = self.actor_if_exists(db, adjuster).await? else {
                continue;
            };
            if policy::can_manage(ctx, &actor) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Builds the split batch for a freshly inserted expense.
    ///
    /// Custom instructions naming users without an active participant row are
    /// dropped silently; an empty batch (custom or average) produces no
    /// splits and is not an error here.
    async fn initial_splits(
        &self,
        db: &DatabaseTransaction,
        expense: &Expense,
        activity_id: Uuid,
        instructions: Option<Vec<SplitInstruction>>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Split>> {
        let rows = self.activity_participant_rows(db, activity_id).await?;
        match instructions {
            Some(instructions) => {
                let known: Vec<SplitInstruction> = instructions
                    .into_iter()
                    .filter(|i| rows.iter().any(|p| p.is_active && p.user_id == i.user_id))
                    .collect();
                if known.is_empty() {
                    return Ok(Vec::new());
                }
                split::custom_splits(expense.id, expense.amount, &known, &actor.user_id, now)
            }
            None => {
                let users: Vec<String> =
                    split::eligible_participants(expense.id, expense.occurred_at, &rows)
                        .into_iter()
                        .map(|p| p.user_id.clone())
                        .collect();
                Ok(split::average_splits(expense.id, expense.amount, &users))
            }
        }
    }

    /// Records an expense and, when it belongs to a splitting activity, its
    /// initial split batch, all in one transaction.
    pub async fn create_expense(
        &self,
        user_id: &str,
        draft: ExpenseDraft,
        instructions: Option<Vec<SplitInstruction>>,
        now: DateTime<Utc>,
    ) -> ResultEngine<(Expense, Vec<Split>)> {
        let description = normalize_required_name(&draft.description, "expense")?;
        let category = normalize_optional_text(draft.category.as_deref());
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;

            let ctx = match draft.activity_id {
                Some(activity_id) => {
                    let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
                    let participant = self
                        .participant_row(&db_tx, activity_id, &actor.user_id)
                        .await?;
                    policy::check_expense_creation(&ctx, &actor, participant.as_ref())?;
                    Some(ctx)
                }
                None => None,
            };

            let group_id = match (&draft.group_id, &ctx) {
                (Some(group_id), _) => {
                    self.require_group(&db_tx, group_id).await?;
                    Some(group_id.clone())
                }
                (None, Some(ctx)) => Some(ctx.activity.group_id.clone()),
                (None, None) => None,
            };

            let expense = Expense::new(
                draft.amount,
                draft.kind,
                draft.occurred_at,
                description.clone(),
                category.clone(),
                draft.activity_id,
                group_id,
                actor.user_id.clone(),
            )?;
            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;

            let batch = match &ctx {
                Some(ctx) if ctx.activity.allow_split => {
                    let batch = self
                        .initial_splits(
                            &db_tx,
                            &expense,
                            ctx.activity.id,
                            instructions,
                            &actor,
                            now,
                        )
                        .await?;
                    self.persist_splits(&db_tx, &batch).await?;
                    batch
                }
                _ => Vec::new(),
            };

            if let Some(ctx) = &ctx {
                self.append_log(
                    &db_tx,
                    ctx.activity.id,
                    ActionType::ExpenseAdd,
                    format!("{} recorded \"{}\"", actor.user_id, description),
                    Some(&actor.user_id),
                    serde_json::json!({
                        "expense_id": expense.id,
                        "amount": expense.amount,
                        "splits": batch.len(),
                    }),
                    now,
                )
                .await?;
            }

            Ok((expense, batch))
        })
    }

    /// Replaces the split batch of an expense wholesale.
    ///
    /// Unlike expense creation, an instruction naming a user without a
    /// participant row fails the whole call with `NotFound`.
    pub async fn adjust_splits(
        &self,
        expense_id: Uuid,
        user_id: &str,
        instructions: Vec<SplitInstruction>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Split>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let expense = self.require_expense(&db_tx, expense_id).await?;
            let activity_id = expense.activity_id.ok_or_else(|| {
                EngineError::InvalidState(
                    "expense is not linked to an activity".to_string(),
                )
            })?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            let participant = self
                .participant_row(&db_tx, activity_id, &actor.user_id)
                .await?;
            let existing = self.load_splits(&db_tx, expense_id).await?;
            let locked = self
                .splits_locked_by_manager(&db_tx, &ctx, &existing)
                .await?;

            if !policy::can_adjust_split(&ctx, &expense, &actor, participant.as_ref(), locked) {
                return Err(EngineError::Unauthorized(
                    "not allowed to adjust these splits".to_string(),
                ));
            }

            let rows = self.activity_participant_rows(&db_tx, activity_id).await?;
            for instruction in &instructions {
                if !rows.iter().any(|p| p.user_id == instruction.user_id) {
                    return Err(EngineError::NotFound("participant".to_string()));
                }
            }

            let batch =
                split::custom_splits(expense_id, expense.amount, &instructions, &actor.user_id, now)?;
            self.delete_expense_splits(&db_tx, expense_id).await?;
            self.persist_splits(&db_tx, &batch).await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::SplitAdjust,
                format!("{} adjusted splits for \"{}\"", actor.user_id, expense.description),
                Some(&actor.user_id),
                serde_json::json!({ "expense_id": expense_id, "splits": batch.len() }),
                now,
            )
            .await?;

            Ok(batch)
        })
    }

    /// Discards the current splits and regenerates the default average batch
    /// from the current eligible set.
    pub async fn auto_split(
        &self,
        expense_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Split>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let expense = self.require_expense(&db_tx, expense_id).await?;
            let activity_id = expense.activity_id.ok_or_else(|| {
                EngineError::InvalidState(
                    "expense is not linked to an activity".to_string(),
                )
            })?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_edit_expense(&expense, &actor, Some(&ctx)) {
                return Err(EngineError::Unauthorized(
                    "not allowed to edit this expense".to_string(),
                ));
            }

            let rows = self.activity_participant_rows(&db_tx, activity_id).await?;
            let users: Vec<String> =
                split::eligible_participants(expense_id, expense.occurred_at, &rows)
                    .into_iter()
                    .map(|p| p.user_id.clone())
                    .collect();
            if users.is_empty() {
                return Err(EngineError::NoEligibleParticipants);
            }

            let batch = split::average_splits(expense_id, expense.amount, &users);
            self.delete_expense_splits(&db_tx, expense_id).await?;
            self.persist_splits(&db_tx, &batch).await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::SplitAdjust,
                format!("{} re-split \"{}\" evenly", actor.user_id, expense.description),
                Some(&actor.user_id),
                serde_json::json!({ "expense_id": expense_id, "splits": batch.len() }),
                now,
            )
            .await?;

            Ok(batch)
        })
    }

    /// Deletes an expense together with its splits.
    pub async fn delete_expense(
        &self,
        expense_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let expense = self.require_expense(&db_tx, expense_id).await?;
            let ctx = match expense.activity_id {
                Some(activity_id) => Some(self.load_activity_ctx(&db_tx, activity_id).await?),
                None => None,
            };
            if !policy::can_edit_expense(&expense, &actor, ctx.as_ref()) {
                return Err(EngineError::Unauthorized(
                    "not allowed to delete this expense".to_string(),
                ));
            }

            self.delete_expense_splits(&db_tx, expense_id).await?;
            expenses::Entity::delete_by_id(expense_id.to_string())
                .exec(&db_tx)
                .await?;

            if let Some(ctx) = &ctx {
                self.append_log(
                    &db_tx,
                    ctx.activity.id,
                    ActionType::ExpenseDelete,
                    format!("{} deleted \"{}\"", actor.user_id, expense.description),
                    Some(&actor.user_id),
                    serde_json::json!({ "expense_id": expense_id, "amount": expense.amount }),
                    now,
                )
                .await?;
            }

            Ok(())
        })
    }

    /// Reads back the persisted splits of an expense.
    pub async fn expense_splits(
        &self,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Split>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let expense = self.require_expense(&db_tx, expense_id).await?;
            let visible = match expense.activity_id {
                Some(activity_id) => {
                    let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
                    self.can_view_activity(&db_tx, &ctx, &actor).await?
                }
                None => actor.is_admin() || expense.created_by == actor.user_id,
            };
            if !visible {
                return Err(EngineError::Unauthorized(
                    "not allowed to view this expense".to_string(),
                ));
            }
            self.load_splits(&db_tx, expense_id).await
        })
    }
}
