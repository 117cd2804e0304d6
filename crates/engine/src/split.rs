//! Pure split calculation.
//!
//! Everything here is side-effect free: eligibility resolution, the default
//! average split and the custom batch with its reconciliation check all
//! operate on values the ops layer already loaded. The ops layer decides
//! what to persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, Participant, ResultEngine, Split, SplitOption, SplitType, SplitValue,
    RECONCILE_EPSILON,
};

/// One caller-declared share in a custom split batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitInstruction {
    pub user_id: String,
    pub split_type: SplitType,
    pub split_value: SplitValue,
    /// Pre-resolved cents. When `None` the engine derives it from
    /// `split_value` and the expense amount.
    pub calculated: Option<MoneyCents>,
}

impl SplitInstruction {
    fn resolve(&self, amount: MoneyCents) -> MoneyCents {
        if let Some(calculated) = self.calculated {
            return calculated;
        }
        if self.split_type.is_fractional() {
            self.split_value.apply_to(amount)
        } else {
            self.split_value.as_amount()
        }
    }
}

/// Filters the active participants eligible to share one expense.
///
/// `FullSplit` always shares, `NoSplit` shares only expenses dated on or
/// after the join, `PartialSplit` shares only expenses it explicitly
/// selected. Deactivated rows never share.
pub fn eligible_participants<'a>(
    expense_id: Uuid,
    occurred_at: DateTime<Utc>,
    participants: &'a [Participant],
) -> Vec<&'a Participant> {
    participants
        .iter()
        .filter(|p| p.is_active)
        .filter(|p| match p.split_option {
            SplitOption::FullSplit => true,
            SplitOption::NoSplit => occurred_at >= p.joined_at,
            SplitOption::PartialSplit => p.partial_expenses.contains(&expense_id),
        })
        .collect()
}

/// Builds the default average split over `users`.
///
/// Every share records the `1/n` fraction; the calculated cents come from
/// [`MoneyCents::split_even`], so the batch always sums exactly to `amount`.
pub fn average_splits(expense_id: Uuid, amount: MoneyCents, users: &[String]) -> Vec<Split> {
    let fraction = SplitValue::fraction_of(users.len());
    let parts = amount.split_even(users.len());
    users
        .iter()
        .zip(parts)
        .map(|(user_id, calculated)| Split {
            id: Uuid::new_v4(),
            expense_id,
            user_id: user_id.clone(),
            split_type: SplitType::Average,
            split_value: fraction,
            calculated,
            is_adjusted: false,
            adjusted_by: None,
            adjusted_at: None,
        })
        .collect()
}

/// Builds a custom split batch and reconciles it against `amount`.
///
/// The batch is all-or-nothing: if the resolved shares stray from the
/// expense amount by more than [`RECONCILE_EPSILON`] the whole call fails
/// with `SplitMismatch` and nothing may be persisted. Every produced row is
/// marked adjusted and attributed to `actor`.
pub fn custom_splits(
    expense_id: Uuid,
    amount: MoneyCents,
    instructions: &[SplitInstruction],
    actor: &str,
    now: DateTime<Utc>,
) -> ResultEngine<Vec<Split>> {
    let splits: Vec<Split> = instructions
        .iter()
        .map(|instruction| Split {
            id: Uuid::new_v4(),
            expense_id,
            user_id: instruction.user_id.clone(),
            split_type: instruction.split_type,
            split_value: instruction.split_value,
            calculated: instruction.resolve(amount),
            is_adjusted: true,
            adjusted_by: Some(actor.to_string()),
            adjusted_at: Some(now),
        })
        .collect();

    let mut total = MoneyCents::ZERO;
    for split in &splits {
        total += split.calculated;
    }
    if total.abs_diff(amount) > RECONCILE_EPSILON {
        return Err(EngineError::SplitMismatch {
            expected: amount,
            actual: total,
        });
    }
    Ok(splits)
}
