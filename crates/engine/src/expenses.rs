//! Expense records.
//!
//! An expense belongs to at most one activity; activity-less expenses are
//! plain group bookkeeping and never carry splits. Amounts are always
//! positive, with direction expressed by [`ExpenseKind`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    Expense,
    Income,
}

impl ExpenseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl TryFrom<&str> for ExpenseKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(EngineError::InvalidState(format!(
                "invalid expense kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub amount: MoneyCents,
    pub kind: ExpenseKind,
    pub occurred_at: DateTime<Utc>,
    pub description: String,
    pub category: Option<String>,
    pub activity_id: Option<Uuid>,
    pub group_id: Option<String>,
    pub created_by: String,
}

impl Expense {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        amount: MoneyCents,
        kind: ExpenseKind,
        occurred_at: DateTime<Utc>,
        description: String,
        category: Option<String>,
        activity_id: Option<Uuid>,
        group_id: Option<String>,
        created_by: String,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "expense amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            amount,
            kind,
            occurred_at,
            description,
            category,
            activity_id,
            group_id,
            created_by,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub amount_cents: i64,
    pub kind: String,
    pub occurred_at: DateTimeUtc,
    pub description: String,
    pub category: Option<String>,
    pub activity_id: Option<String>,
    pub group_id: Option<String>,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::splits::Entity")]
    Splits,
}

impl Related<super::splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            amount_cents: ActiveValue::Set(expense.amount.cents()),
            kind: ActiveValue::Set(expense.kind.as_str().to_string()),
            occurred_at: ActiveValue::Set(expense.occurred_at),
            description: ActiveValue::Set(expense.description.clone()),
            category: ActiveValue::Set(expense.category.clone()),
            activity_id: ActiveValue::Set(expense.activity_id.map(|id| id.to_string())),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            created_by: ActiveValue::Set(expense.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let activity_id = model
            .activity_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| EngineError::NotFound("activity".to_string()))?;
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("expense".to_string()))?,
            amount: MoneyCents::new(model.amount_cents),
            kind: ExpenseKind::try_from(model.kind.as_str())?,
            occurred_at: model.occurred_at,
            description: model.description,
            category: model.category,
            activity_id,
            group_id: model.group_id,
            created_by: model.created_by,
        })
    }
}
