//! Participant registry.
//!
//! A `Participant` is a user's membership in one activity, carrying the
//! split preference that drives eligibility resolution. Rows are
//! soft-deactivated on leave, never deleted, so past splits keep their
//! attribution.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// How a participant shares costs recorded against the activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitOption {
    /// Shares only expenses dated on or after the join timestamp.
    NoSplit,
    /// Shares only expenses explicitly listed in the selection set.
    PartialSplit,
    /// Shares every expense.
    FullSplit,
}

impl SplitOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSplit => "no_split",
            Self::PartialSplit => "partial_split",
            Self::FullSplit => "full_split",
        }
    }
}

impl TryFrom<&str> for SplitOption {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "no_split" => Ok(Self::NoSplit),
            "partial_split" => Ok(Self::PartialSplit),
            "full_split" => Ok(Self::FullSplit),
            other => Err(EngineError::InvalidState(format!(
                "invalid split option: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub activity_id: Uuid,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub split_option: SplitOption,
    pub is_active: bool,
    /// Expense ids selected under `PartialSplit`; empty otherwise.
    pub partial_expenses: BTreeSet<Uuid>,
    /// Delegated authority to adjust splits without being a manager.
    pub can_adjust_splits: bool,
}

impl Participant {
    pub fn new(
        activity_id: Uuid,
        user_id: String,
        split_option: SplitOption,
        partial_expenses: BTreeSet<Uuid>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            activity_id,
            user_id,
            joined_at,
            split_option,
            is_active: true,
            partial_expenses,
            can_adjust_splits: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub activity_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub joined_at: DateTimeUtc,
    pub split_option: String,
    pub is_active: bool,
    /// JSON array of expense ids, parsed into a typed set at the boundary.
    pub partial_expenses: String,
    pub can_adjust_splits: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activities::Entity",
        from = "Column::ActivityId",
        to = "super::activities::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Activities,
}

impl Related<super::activities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn encode_partial_expenses(set: &BTreeSet<Uuid>) -> ResultEngine<String> {
    let ids: Vec<String> = set.iter().map(Uuid::to_string).collect();
    serde_json::to_string(&ids)
        .map_err(|_| EngineError::InvalidState("unencodable partial split selection".to_string()))
}

pub(crate) fn decode_partial_expenses(raw: &str) -> ResultEngine<BTreeSet<Uuid>> {
    let corrupt =
        || EngineError::InvalidState("corrupt partial split selection".to_string());
    let ids: Vec<String> = serde_json::from_str(raw).map_err(|_| corrupt())?;
    ids.iter()
        .map(|id| Uuid::parse_str(id).map_err(|_| corrupt()))
        .collect()
}

impl TryFrom<&Participant> for ActiveModel {
    type Error = EngineError;

    fn try_from(participant: &Participant) -> Result<Self, Self::Error> {
        Ok(Self {
            activity_id: ActiveValue::Set(participant.activity_id.to_string()),
            user_id: ActiveValue::Set(participant.user_id.clone()),
            joined_at: ActiveValue::Set(participant.joined_at),
            split_option: ActiveValue::Set(participant.split_option.as_str().to_string()),
            is_active: ActiveValue::Set(participant.is_active),
            partial_expenses: ActiveValue::Set(encode_partial_expenses(
                &participant.partial_expenses,
            )?),
            can_adjust_splits: ActiveValue::Set(participant.can_adjust_splits),
        })
    }
}

impl TryFrom<Model> for Participant {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            activity_id: Uuid::parse_str(&model.activity_id)
                .map_err(|_| EngineError::NotFound("activity".to_string()))?,
            user_id: model.user_id,
            joined_at: model.joined_at,
            split_option: SplitOption::try_from(model.split_option.as_str())?,
            is_active: model.is_active,
            partial_expenses: decode_partial_expenses(&model.partial_expenses)?,
            can_adjust_splits: model.can_adjust_splits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_expense_codec_round_trip() {
        let mut set = BTreeSet::new();
        set.insert(Uuid::new_v4());
        set.insert(Uuid::new_v4());
        let encoded = encode_partial_expenses(&set).unwrap();
        assert_eq!(decode_partial_expenses(&encoded).unwrap(), set);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_partial_expenses("not json").is_err());
        assert!(decode_partial_expenses("[\"nope\"]").is_err());
    }
}
