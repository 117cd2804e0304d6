use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ActionType, EngineError, Participant, ResultEngine, SplitOption, activity_managers,
    participants, policy,
};

use super::{Engine, with_tx};

impl Engine {
    /// Inserts a new participant row, or reactivates a soft-deactivated one
    /// with a fresh join timestamp and preference. An already-active row is
    /// an `ExistingKey` error.
    async fn enroll_participant(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
        user_id: &str,
        split_option: SplitOption,
        partial_expenses: BTreeSet<Uuid>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Participant> {
        let existing = self.participant_row(db, activity_id, user_id).await?;
        let participant = Participant::new(
            activity_id,
            user_id.to_string(),
            split_option,
            partial_expenses,
            now,
        );
        let active: participants::ActiveModel = (&participant).try_into()?;
        match existing {
            Some(row) if row.is_active => {
                return Err(EngineError::ExistingKey("participant".to_string()));
            }
            Some(_) => {
                active.update(db).await?;
            }
            None => {
                active.insert(db).await?;
            }
        }
        Ok(participant)
    }

    async fn ensure_manager_row(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bool> {
        let exists = activity_managers::Entity::find_by_id((
            activity_id.to_string(),
            user_id.to_string(),
        ))
        .one(db)
        .await?
        .is_some();
        if exists {
            return Ok(false);
        }
        activity_managers::ActiveModel {
            activity_id: ActiveValue::Set(activity_id.to_string()),
            user_id: ActiveValue::Set(user_id.to_string()),
        }
        .insert(db)
        .await?;
        Ok(true)
    }

    /// Joins the calling user to an activity.
    ///
    /// Non-managers may only join before the activity starts. Admin joiners
    /// are enrolled into the manager set as well.
    pub async fn join_activity(
        &self,
        activity_id: Uuid,
        user_id: &str,
        split_option: SplitOption,
        partial_expenses: BTreeSet<Uuid>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Participant> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;

            if ctx.activity.is_in_progress(now) && !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "the activity has already started".to_string(),
                ));
            }

            let participant = self
                .enroll_participant(
                    &db_tx,
                    activity_id,
                    &actor.user_id,
                    split_option,
                    partial_expenses,
                    now,
                )
                .await?;

            let auto_manager = if actor.is_admin() {
                self.ensure_manager_row(&db_tx, activity_id, &actor.user_id)
                    .await?
            } else {
                false
            };

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::UserJoin,
                format!("{} joined the activity", actor.user_id),
                Some(&actor.user_id),
                serde_json::json!({ "auto_manager": auto_manager }),
                now,
            )
            .await?;

            Ok(participant)
        })
    }

    /// Enrolls `target` on behalf of a manager, bypassing the start gate.
    pub async fn invite_participant(
        &self,
        activity_id: Uuid,
        target: &str,
        split_option: SplitOption,
        partial_expenses: BTreeSet<Uuid>,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<Participant> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "only managers may invite participants".to_string(),
                ));
            }
            let target_actor = self.require_user(&db_tx, target).await?;

            let participant = self
                .enroll_participant(
                    &db_tx,
                    activity_id,
                    &target_actor.user_id,
                    split_option,
                    partial_expenses,
                    now,
                )
                .await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::UserJoin,
                format!("{} invited {} to the activity", actor.user_id, target),
                Some(&actor.user_id),
                serde_json::json!({ "invited": true, "target": target }),
                now,
            )
            .await?;

            Ok(participant)
        })
    }

    /// Leaves an activity.
    ///
    /// Participant rows are soft-deactivated, never deleted. A leaver who is
    /// also a manager gives up the manager row too, unless they are the last
    /// one. A manager with no participant row may still step down this way.
    pub async fn leave_activity(
        &self,
        activity_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<String> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            let row = self
                .participant_row(&db_tx, activity_id, &actor.user_id)
                .await?;
            let is_manager = ctx.is_manager(&actor.user_id);

            let message = match row {
                Some(mut participant) if participant.is_active => {
                    if is_manager {
                        if ctx.managers.len() <= 1 {
                            return Err(EngineError::LastManagerViolation);
                        }
                        activity_managers::Entity::delete_by_id((
                            activity_id.to_string(),
                            actor.user_id.clone(),
                        ))
                        .exec(&db_tx)
                        .await?;
                    }
                    participant.is_active = false;
                    let active: participants::ActiveModel = (&participant).try_into()?;
                    active.update(&db_tx).await?;
                    format!("{} left the activity", actor.user_id)
                }
                _ if is_manager => {
                    if ctx.managers.len() <= 1 {
                        return Err(EngineError::LastManagerViolation);
                    }
                    activity_managers::Entity::delete_by_id((
                        activity_id.to_string(),
                        actor.user_id.clone(),
                    ))
                    .exec(&db_tx)
                    .await?;
                    format!("{} stepped down as manager", actor.user_id)
                }
                _ => return Err(EngineError::NotFound("participant".to_string())),
            };

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::UserLeave,
                message.clone(),
                Some(&actor.user_id),
                serde_json::json!({}),
                now,
            )
            .await?;

            Ok(message)
        })
    }

    /// Lists the active participants, enforcing read visibility.
    pub async fn participants(
        &self,
        activity_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Participant>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !self.can_view_activity(&db_tx, &ctx, &actor).await? {
                return Err(EngineError::Unauthorized(
                    "not allowed to view this activity".to_string(),
                ));
            }
            let rows = self.activity_participant_rows(&db_tx, activity_id).await?;
            Ok(rows.into_iter().filter(|p| p.is_active).collect())
        })
    }

    /// Grants or revokes the split-adjustment delegation on a participant.
    pub async fn set_split_delegation(
        &self,
        activity_id: Uuid,
        target: &str,
        allowed: bool,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<Participant> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "only managers may delegate split adjustment".to_string(),
                ));
            }

            let mut participant = self
                .participant_row(&db_tx, activity_id, target)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| EngineError::NotFound("participant".to_string()))?;
            participant.can_adjust_splits = allowed;
            let active: participants::ActiveModel = (&participant).try_into()?;
            active.update(&db_tx).await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::ActivityEdit,
                format!(
                    "{} {} split adjustment for {}",
                    actor.user_id,
                    if allowed { "delegated" } else { "revoked" },
                    target
                ),
                Some(&actor.user_id),
                serde_json::json!({ "target": target, "can_adjust_splits": allowed }),
                now,
            )
            .await?;

            Ok(participant)
        })
    }
}
