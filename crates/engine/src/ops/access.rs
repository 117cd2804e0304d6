use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    Activity, EngineError, Expense, Participant, ResultEngine, activities, activity_managers,
    group_managers, groups, participants,
    policy::{Actor, ActivityCtx},
    users,
};

use super::Engine;

impl Engine {
    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Actor> {
        self.actor_if_exists(db, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("user".to_string()))
    }

    pub(super) async fn actor_if_exists(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Option<Actor>> {
        let Some(model) = users::Entity::find_by_id(user_id.to_string()).one(db).await? else {
            return Ok(None);
        };
        Ok(Some(Actor {
            user_id: model.username,
            role: model.role.as_str().try_into()?,
        }))
    }

    pub(super) async fn require_activity(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
    ) -> ResultEngine<Activity> {
        activities::Entity::find_by_id(activity_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("activity".to_string()))?
            .try_into()
    }

    pub(super) async fn manager_ids(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
    ) -> ResultEngine<Vec<String>> {
        let rows = activity_managers::Entity::find()
            .filter(activity_managers::Column::ActivityId.eq(activity_id.to_string()))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }

    /// Loads the activity together with its manager set, the unit every
    /// policy decision runs against.
    pub(super) async fn load_activity_ctx(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
    ) -> ResultEngine<ActivityCtx> {
        let activity = self.require_activity(db, activity_id).await?;
        let managers = self.manager_ids(db, activity_id).await?;
        Ok(ActivityCtx { activity, managers })
    }

    pub(super) async fn participant_row(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<Participant>> {
        participants::Entity::find_by_id((activity_id.to_string(), user_id.to_string()))
            .one(db)
            .await?
            .map(Participant::try_from)
            .transpose()
    }

    /// All participant rows for an activity, deactivated ones included.
    /// Eligibility filtering happens downstream.
    pub(super) async fn activity_participant_rows(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
    ) -> ResultEngine<Vec<Participant>> {
        participants::Entity::find()
            .filter(participants::Column::ActivityId.eq(activity_id.to_string()))
            .all(db)
            .await?
            .into_iter()
            .map(Participant::try_from)
            .collect()
    }

    pub(super) async fn group_manager_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Vec<String>> {
        let rows = group_managers::Entity::find()
            .filter(group_managers::Column::GroupId.eq(group_id.to_string()))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<()> {
        let exists = groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::NotFound("group".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<Expense> {
        crate::expenses::Entity::find_by_id(expense_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("expense".to_string()))?
            .try_into()
    }

    /// Read visibility: managers, admins, group managers and participants
    /// (active or past) may see the activity.
    pub(super) async fn can_view_activity(
        &self,
        db: &DatabaseTransaction,
        ctx: &ActivityCtx,
        actor: &Actor,
    ) -> ResultEngine<bool> {
        let group_managers = self.group_manager_ids(db, &ctx.activity.group_id).await?;
        if crate::policy::can_view_finances(ctx, actor, &group_managers) {
            return Ok(true);
        }
        Ok(self
            .participant_row(db, ctx.activity.id, &actor.user_id)
            .await?
            .is_some())
    }
}
