//! Activity records and their lifecycle state machine.
//!
//! An `Activity` is a time-boxed event owned by a group. Expenses and
//! participants attach to it, and its status gates what non-managers may
//! still change. The state machine is one-way: `Active` is the only state
//! with outgoing transitions, and settlement is the only path to
//! `Completed`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Active,
    Completed,
    Cancelled,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `Completed` and `Cancelled` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl TryFrom<&str> for ActivityStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidState(format!(
                "invalid activity status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ActivityStatus,
    pub enabled: bool,
    pub is_locked: bool,
    pub settlement_date: Option<DateTime<Utc>>,
    pub allow_split: bool,
    pub budget: Option<MoneyCents>,
    pub group_id: String,
    pub created_by: String,
}

impl Activity {
    pub fn new(
        name: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        group_id: String,
        created_by: String,
        budget: Option<MoneyCents>,
    ) -> ResultEngine<Self> {
        if start_date > end_date {
            return Err(EngineError::InvalidState(
                "start_date must not be after end_date".to_string(),
            ));
        }
        if let Some(budget) = budget
            && budget.is_negative()
        {
            return Err(EngineError::InvalidAmount(
                "budget must not be negative".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            start_date,
            end_date,
            status: ActivityStatus::Active,
            enabled: true,
            is_locked: false,
            settlement_date: None,
            allow_split: true,
            budget,
            group_id,
            created_by,
        })
    }

    /// The activity has started (pure derived query, not stored state).
    pub fn is_in_progress(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now
    }

    pub fn is_before_start(&self, now: DateTime<Utc>) -> bool {
        self.start_date > now
    }

    /// Applies the settlement transition.
    ///
    /// Rejects with `InvalidState` once the activity left `Active`, so a
    /// second settlement call never changes anything.
    pub fn settle(&mut self, now: DateTime<Utc>) -> ResultEngine<()> {
        if self.status != ActivityStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "activity is already {}",
                self.status.as_str()
            )));
        }
        self.status = ActivityStatus::Completed;
        self.is_locked = true;
        self.settlement_date = Some(now);
        Ok(())
    }

    /// Applies the cancellation transition (`Active` → `Cancelled`).
    pub fn cancel(&mut self) -> ResultEngine<()> {
        if self.status != ActivityStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "activity is already {}",
                self.status.as_str()
            )));
        }
        self.status = ActivityStatus::Cancelled;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,
    pub status: String,
    pub enabled: bool,
    pub is_locked: bool,
    pub settlement_date: Option<DateTimeUtc>,
    pub allow_split: bool,
    pub budget_cents: Option<i64>,
    pub group_id: String,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity_managers::Entity")]
    ActivityManagers,
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
}

impl Related<super::activity_managers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityManagers.def()
    }
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Activity> for ActiveModel {
    fn from(activity: &Activity) -> Self {
        Self {
            id: ActiveValue::Set(activity.id.to_string()),
            name: ActiveValue::Set(activity.name.clone()),
            start_date: ActiveValue::Set(activity.start_date),
            end_date: ActiveValue::Set(activity.end_date),
            status: ActiveValue::Set(activity.status.as_str().to_string()),
            enabled: ActiveValue::Set(activity.enabled),
            is_locked: ActiveValue::Set(activity.is_locked),
            settlement_date: ActiveValue::Set(activity.settlement_date),
            allow_split: ActiveValue::Set(activity.allow_split),
            budget_cents: ActiveValue::Set(activity.budget.map(MoneyCents::cents)),
            group_id: ActiveValue::Set(activity.group_id.clone()),
            created_by: ActiveValue::Set(activity.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for Activity {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("activity".to_string()))?,
            name: model.name,
            start_date: model.start_date,
            end_date: model.end_date,
            status: ActivityStatus::try_from(model.status.as_str())?,
            enabled: model.enabled,
            is_locked: model.is_locked,
            settlement_date: model.settlement_date,
            allow_split: model.allow_split,
            budget: model.budget_cents.map(MoneyCents::new),
            group_id: model.group_id,
            created_by: model.created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn activity() -> Activity {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 7, 3, 20, 0, 0).unwrap();
        Activity::new(
            "Harvest feast".to_string(),
            start,
            end,
            "g1".to_string(),
            "amei".to_string(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn settle_is_one_way() {
        let mut activity = activity();
        let now = Utc.with_ymd_and_hms(2026, 7, 4, 10, 0, 0).unwrap();

        activity.settle(now).unwrap();
        assert_eq!(activity.status, ActivityStatus::Completed);
        assert!(activity.is_locked);
        assert_eq!(activity.settlement_date, Some(now));

        let err = activity.settle(now).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn cancelled_cannot_settle() {
        let mut activity = activity();
        activity.cancel().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 4, 10, 0, 0).unwrap();
        assert!(matches!(
            activity.settle(now),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn progress_queries_follow_start_date() {
        let activity = activity();
        let before = Utc.with_ymd_and_hms(2026, 6, 30, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 7, 2, 0, 0, 0).unwrap();
        assert!(activity.is_before_start(before));
        assert!(!activity.is_in_progress(before));
        assert!(activity.is_in_progress(after));
    }
}
