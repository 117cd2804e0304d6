//! Persisted split rows.
//!
//! A split assigns one participant a share of one expense. `split_value`
//! keeps the declared share in its original unit (a fraction for the
//! proportional types, an amount for the fixed ones) while `calculated`
//! holds the resolved cents used by reconciliation.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, SplitValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    /// Equal fraction per eligible participant.
    Average,
    /// Caller-declared fraction of the total.
    Ratio,
    /// Fixed amount in cents.
    Fixed,
    /// Fixed amount, attached to a hand-picked subset.
    Selective,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Ratio => "ratio",
            Self::Fixed => "fixed",
            Self::Selective => "selective",
        }
    }

    /// The declared value is a fraction of the expense amount.
    pub fn is_fractional(self) -> bool {
        matches!(self, Self::Average | Self::Ratio)
    }
}

impl TryFrom<&str> for SplitType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "average" => Ok(Self::Average),
            "ratio" => Ok(Self::Ratio),
            "fixed" => Ok(Self::Fixed),
            "selective" => Ok(Self::Selective),
            other => Err(EngineError::InvalidState(format!(
                "invalid split type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub user_id: String,
    pub split_type: SplitType,
    pub split_value: SplitValue,
    pub calculated: MoneyCents,
    pub is_adjusted: bool,
    pub adjusted_by: Option<String>,
    pub adjusted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    pub split_type: String,
    pub split_value_e4: i64,
    pub calculated_cents: i64,
    pub is_adjusted: bool,
    pub adjusted_by: Option<String>,
    pub adjusted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Split> for ActiveModel {
    fn from(split: &Split) -> Self {
        Self {
            id: ActiveValue::Set(split.id.to_string()),
            expense_id: ActiveValue::Set(split.expense_id.to_string()),
            user_id: ActiveValue::Set(split.user_id.clone()),
            split_type: ActiveValue::Set(split.split_type.as_str().to_string()),
            split_value_e4: ActiveValue::Set(split.split_value.raw()),
            calculated_cents: ActiveValue::Set(split.calculated.cents()),
            is_adjusted: ActiveValue::Set(split.is_adjusted),
            adjusted_by: ActiveValue::Set(split.adjusted_by.clone()),
            adjusted_at: ActiveValue::Set(split.adjusted_at),
        }
    }
}

impl TryFrom<Model> for Split {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("split".to_string()))?,
            expense_id: Uuid::parse_str(&model.expense_id)
                .map_err(|_| EngineError::NotFound("expense".to_string()))?,
            user_id: model.user_id,
            split_type: SplitType::try_from(model.split_type.as_str())?,
            split_value: SplitValue::from_raw(model.split_value_e4),
            calculated: MoneyCents::new(model.calculated_cents),
            is_adjusted: model.is_adjusted,
            adjusted_by: model.adjusted_by,
            adjusted_at: model.adjusted_at,
        })
    }
}
