use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ActionType, Activity, EngineError, MoneyCents, ResultEngine, activities, activity_managers,
    policy,
};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Creates an activity with the creator as its sole manager.
    pub async fn new_activity(
        &self,
        name: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        group_id: &str,
        budget: Option<MoneyCents>,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<Activity> {
        let name = normalize_required_name(name, "activity")?;
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            self.require_group(&db_tx, group_id).await?;

            let activity = Activity::new(
                name.clone(),
                start_date,
                end_date,
                group_id.to_string(),
                actor.user_id.clone(),
                budget,
            )?;
            activities::ActiveModel::from(&activity).insert(&db_tx).await?;

            activity_managers::ActiveModel {
                activity_id: ActiveValue::Set(activity.id.to_string()),
                user_id: ActiveValue::Set(actor.user_id.clone()),
            }
            .insert(&db_tx)
            .await?;

            self.append_log(
                &db_tx,
                activity.id,
                ActionType::ActivityEdit,
                format!("created activity \"{name}\""),
                Some(&actor.user_id),
                serde_json::json!({ "name": name }),
                now,
            )
            .await?;

            Ok(activity)
        })
    }

    /// Loads one activity, enforcing read visibility.
    pub async fn activity(&self, activity_id: Uuid, user_id: &str) -> ResultEngine<Activity> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !self.can_view_activity(&db_tx, &ctx, &actor).await? {
                return Err(EngineError::Unauthorized(
                    "not allowed to view this activity".to_string(),
                ));
            }
            Ok(ctx.activity)
        })
    }

    /// Settles an activity: `Completed`, locked, stamped, audited, all in one
    /// transaction.
    pub async fn settle_activity(
        &self,
        activity_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<Activity> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let mut ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "only managers may settle an activity".to_string(),
                ));
            }

            ctx.activity.settle(now)?;
            activities::ActiveModel::from(&ctx.activity)
                .update(&db_tx)
                .await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::Settlement,
                format!("settled activity \"{}\"", ctx.activity.name),
                Some(&actor.user_id),
                serde_json::json!({ "settlement_date": now }),
                now,
            )
            .await?;

            Ok(ctx.activity)
        })
    }

    /// Cancels an `Active` activity.
    pub async fn cancel_activity(
        &self,
        activity_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<Activity> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let mut ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "only managers may cancel an activity".to_string(),
                ));
            }

            ctx.activity.cancel()?;
            activities::ActiveModel::from(&ctx.activity)
                .update(&db_tx)
                .await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::ActivityEdit,
                format!("cancelled activity \"{}\"", ctx.activity.name),
                Some(&actor.user_id),
                serde_json::json!({ "status": "cancelled" }),
                now,
            )
            .await?;

            Ok(ctx.activity)
        })
    }

    /// Grants manager status. The target must be an active participant unless
    /// they are a global admin.
    pub async fn add_manager(
        &self,
        activity_id: Uuid,
        target: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "only managers may grant manager status".to_string(),
                ));
            }

            let target_actor = self.require_user(&db_tx, target).await?;
            if ctx.is_manager(&target_actor.user_id) {
                return Err(EngineError::ExistingKey("manager".to_string()));
            }
            if !target_actor.is_admin() {
                let row = self
                    .participant_row(&db_tx, activity_id, &target_actor.user_id)
                    .await?;
                if !row.is_some_and(|p| p.is_active) {
                    return Err(EngineError::InvalidState(
                        "manager target must be an active participant".to_string(),
                    ));
                }
            }

            activity_managers::ActiveModel {
                activity_id: ActiveValue::Set(activity_id.to_string()),
                user_id: ActiveValue::Set(target_actor.user_id.clone()),
            }
            .insert(&db_tx)
            .await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::ManagerAdded,
                format!("{} granted manager status to {}", actor.user_id, target),
                Some(&actor.user_id),
                serde_json::json!({ "target": target }),
                now,
            )
            .await?;

            Ok(())
        })
    }

    /// Revokes manager status, keeping the manager set non-empty.
    pub async fn remove_manager(
        &self,
        activity_id: Uuid,
        target: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !policy::can_manage(&ctx, &actor) {
                return Err(EngineError::Unauthorized(
                    "only managers may revoke manager status".to_string(),
                ));
            }
            policy::check_manager_removal(&ctx, &actor, target)?;

            activity_managers::Entity::delete_by_id((
                activity_id.to_string(),
                target.to_string(),
            ))
            .exec(&db_tx)
            .await?;

            self.append_log(
                &db_tx,
                activity_id,
                ActionType::ManagerRemoved,
                format!("{} revoked manager status from {}", actor.user_id, target),
                Some(&actor.user_id),
                serde_json::json!({ "target": target }),
                now,
            )
            .await?;

            Ok(())
        })
    }
}
