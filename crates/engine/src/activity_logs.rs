//! Append-only activity log.
//!
//! Every mutating operation writes one row inside its own transaction, so a
//! committed mutation always has its log entry and a rolled-back one never
//! does.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ExpenseAdd,
    ExpenseDelete,
    UserJoin,
    UserLeave,
    SplitAdjust,
    ActivityEdit,
    Settlement,
    ManagerAdded,
    ManagerRemoved,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpenseAdd => "expense_add",
            Self::ExpenseDelete => "expense_delete",
            Self::UserJoin => "user_join",
            Self::UserLeave => "user_leave",
            Self::SplitAdjust => "split_adjust",
            Self::ActivityEdit => "activity_edit",
            Self::Settlement => "settlement",
            Self::ManagerAdded => "manager_added",
            Self::ManagerRemoved => "manager_removed",
        }
    }
}

impl TryFrom<&str> for ActionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense_add" => Ok(Self::ExpenseAdd),
            "expense_delete" => Ok(Self::ExpenseDelete),
            "user_join" => Ok(Self::UserJoin),
            "user_leave" => Ok(Self::UserLeave),
            "split_adjust" => Ok(Self::SplitAdjust),
            "activity_edit" => Ok(Self::ActivityEdit),
            "settlement" => Ok(Self::Settlement),
            "manager_added" => Ok(Self::ManagerAdded),
            "manager_removed" => Ok(Self::ManagerRemoved),
            other => Err(EngineError::InvalidState(format!(
                "invalid action type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub action: ActionType,
    pub description: String,
    /// Acting user, absent for system-initiated writes.
    pub operator: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "activity_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub activity_id: String,
    pub action: String,
    pub description: String,
    pub operator: Option<String>,
    pub metadata: String,
    pub timestamp: DateTimeUtc,
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

impl TryFrom<&LogEntry> for ActiveModel {
    type Error = EngineError;

    fn try_from(entry: &LogEntry) -> Result<Self, Self::Error> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|_| EngineError::InvalidState("unencodable log metadata".to_string()))?;
        Ok(Self {
            id: ActiveValue::Set(entry.id.to_string()),
            activity_id: ActiveValue::Set(entry.activity_id.to_string()),
            action: ActiveValue::Set(entry.action.as_str().to_string()),
            description: ActiveValue::Set(entry.description.clone()),
            operator: ActiveValue::Set(entry.operator.clone()),
            metadata: ActiveValue::Set(metadata),
            timestamp: ActiveValue::Set(entry.timestamp),
        })
    }
}

impl TryFrom<Model> for LogEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("log entry".to_string()))?,
            activity_id: Uuid::parse_str(&model.activity_id)
                .map_err(|_| EngineError::NotFound("activity".to_string()))?,
            action: ActionType::try_from(model.action.as_str())?,
            description: model.description,
            operator: model.operator,
            metadata: serde_json::from_str(&model.metadata)
                .map_err(|_| EngineError::InvalidState("corrupt log metadata".to_string()))?,
            timestamp: model.timestamp,
        })
    }
}
