//! Authorization policy.
//!
//! Pure decision functions over already-loaded state. The ops layer loads
//! the actor, the activity context and any participant rows, then asks this
//! module; nothing here touches the database.
//!
//! Admins pass every check that managers pass. The only rule that binds
//! admins too is the last-manager invariant.

use crate::{
    Activity, EngineError, Expense, Participant, ResultEngine, Role,
};

/// The authenticated user an operation runs as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// An activity plus its manager set, loaded once per operation.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityCtx {
    pub activity: Activity,
    pub managers: Vec<String>,
}

impl ActivityCtx {
    pub fn is_manager(&self, user_id: &str) -> bool {
        self.managers.iter().any(|m| m == user_id)
    }
}

/// Managers and admins may change activity state.
pub fn can_manage(ctx: &ActivityCtx, actor: &Actor) -> bool {
    actor.is_admin() || ctx.is_manager(&actor.user_id)
}

/// Finance visibility extends the manager set with the owning group's
/// managers.
pub fn can_view_finances(ctx: &ActivityCtx, actor: &Actor, group_managers: &[String]) -> bool {
    can_manage(ctx, actor) || group_managers.iter().any(|m| m == &actor.user_id)
}

/// Whether `actor` may record a new expense against the activity.
///
/// Once the activity is locked or left `Active`, only managers may still
/// record. While active, any active participant may.
pub fn can_add_expense(ctx: &ActivityCtx, actor: &Actor, participant: Option<&Participant>) -> bool {
    if can_manage(ctx, actor) {
        return true;
    }
    if ctx.activity.is_locked || ctx.activity.status.is_terminal() {
        return false;
    }
    participant.is_some_and(|p| p.is_active)
}

/// [`can_add_expense`] as a check, with the caller-facing refusal message.
pub fn check_expense_creation(
    ctx: &ActivityCtx,
    actor: &Actor,
    participant: Option<&Participant>,
) -> ResultEngine<()> {
    if can_add_expense(ctx, actor, participant) {
        return Ok(());
    }
    if ctx.activity.is_locked || ctx.activity.status.is_terminal() {
        Err(EngineError::Unauthorized(
            "activity is settled; only managers may record expenses".to_string(),
        ))
    } else {
        Err(EngineError::Unauthorized(
            "only participants and managers may record expenses".to_string(),
        ))
    }
}

/// Recorder, managers and admins may edit or delete an expense.
pub fn can_edit_expense(expense: &Expense, actor: &Actor, ctx: Option<&ActivityCtx>) -> bool {
    if actor.is_admin() || expense.created_by == actor.user_id {
        return true;
    }
    ctx.is_some_and(|ctx| ctx.is_manager(&actor.user_id))
}

/// Whether `actor` may rewrite the splits of an expense.
///
/// Besides the editor set, a participant holding the adjust delegation may,
/// unless a manager already adjusted the batch. The lock is one-directional:
/// a manager adjustment freezes delegated participants out, never the
/// reverse.
pub fn can_adjust_split(
    ctx: &ActivityCtx,
    expense: &Expense,
    actor: &Actor,
    participant: Option<&Participant>,
    locked_by_manager: bool,
) -> bool {
    if can_edit_expense(expense, actor, Some(ctx)) {
        return true;
    }
    if locked_by_manager {
        return false;
    }
    participant.is_some_and(|p| p.is_active && p.can_adjust_splits)
}

/// Validates removing `target` from the manager set.
///
/// Ordering matters for error reporting: an unknown manager is `NotFound`
/// before any invariant fires, the last-manager invariant beats the
/// self-removal rule, and only then does the non-admin self-removal
/// rejection apply.
pub fn check_manager_removal(ctx: &ActivityCtx, actor: &Actor, target: &str) -> ResultEngine<()> {
    if !ctx.is_manager(target) {
        return Err(EngineError::NotFound("manager".to_string()));
    }
    if ctx.managers.len() <= 1 {
        return Err(EngineError::LastManagerViolation);
    }
    if !actor.is_admin() && actor.user_id == target {
        return Err(EngineError::Unauthorized(
            "managers may not remove themselves".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExpenseKind, MoneyCents, SplitOption};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn actor(user_id: &str, role: Role) -> Actor {
        Actor {
            user_id: user_id.to_string(),
            role,
        }
    }

    fn ctx(managers: &[&str]) -> ActivityCtx {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 7, 3, 20, 0, 0).unwrap();
        ActivityCtx {
            activity: Activity::new(
                "Harvest feast".to_string(),
                start,
                end,
                "g1".to_string(),
                "amei".to_string(),
                None,
            )
            .unwrap(),
            managers: managers.iter().map(ToString::to_string).collect(),
        }
    }

    fn participant(user_id: &str) -> Participant {
        Participant::new(
            Uuid::new_v4(),
            user_id.to_string(),
            SplitOption::FullSplit,
            BTreeSet::new(),
            Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
        )
    }

    fn expense(created_by: &str) -> Expense {
        Expense::new(
            MoneyCents::new(1_000),
            ExpenseKind::Expense,
            Utc.with_ymd_and_hms(2026, 7, 2, 12, 0, 0).unwrap(),
            "firewood".to_string(),
            None,
            None,
            None,
            created_by.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn admins_and_managers_can_manage() {
        let ctx = ctx(&["amei"]);
        assert!(can_manage(&ctx, &actor("amei", Role::User)));
        assert!(can_manage(&ctx, &actor("root", Role::Admin)));
        assert!(!can_manage(&ctx, &actor("banai", Role::User)));
    }

    #[test]
    fn group_managers_see_finances() {
        let ctx = ctx(&["amei"]);
        let banai = actor("banai", Role::User);
        assert!(!can_view_finances(&ctx, &banai, &[]));
        assert!(can_view_finances(&ctx, &banai, &["banai".to_string()]));
    }

    #[test]
    fn lock_gates_non_manager_expense_creation() {
        let mut ctx = ctx(&["amei"]);
        let banai = actor("banai", Role::User);
        let row = participant("banai");

        assert!(can_add_expense(&ctx, &banai, Some(&row)));

        let now = Utc.with_ymd_and_hms(2026, 7, 4, 10, 0, 0).unwrap();
        ctx.activity.settle(now).unwrap();
        assert!(!can_add_expense(&ctx, &banai, Some(&row)));
        assert!(can_add_expense(&ctx, &actor("amei", Role::User), None));
        assert!(matches!(
            check_expense_creation(&ctx, &banai, Some(&row)),
            Err(EngineError::Unauthorized(_))
        ));
    }

    #[test]
    fn non_participants_cannot_record() {
        let ctx = ctx(&["amei"]);
        let banai = actor("banai", Role::User);
        assert!(!can_add_expense(&ctx, &banai, None));
        let mut inactive = participant("banai");
        inactive.is_active = false;
        assert!(!can_add_expense(&ctx, &banai, Some(&inactive)));
    }

    #[test]
    fn edit_covers_recorder_manager_admin() {
        let ctx = ctx(&["amei"]);
        let expense = expense("banai");
        assert!(can_edit_expense(&expense, &actor("banai", Role::User), None));
        assert!(can_edit_expense(&expense, &actor("amei", Role::User), Some(&ctx)));
        assert!(can_edit_expense(&expense, &actor("root", Role::Admin), None));
        assert!(!can_edit_expense(&expense, &actor("cudad", Role::User), Some(&ctx)));
    }

    #[test]
    fn delegation_unlocks_adjustment_until_a_manager_intervenes() {
        let ctx = ctx(&["amei"]);
        let expense = expense("amei");
        let cudad = actor("cudad", Role::User);
        let mut row = participant("cudad");

        assert!(!can_adjust_split(&ctx, &expense, &cudad, Some(&row), false));

        row.can_adjust_splits = true;
        assert!(can_adjust_split(&ctx, &expense, &cudad, Some(&row), false));
        assert!(!can_adjust_split(&ctx, &expense, &cudad, Some(&row), true));

        // The lock never binds managers.
        let amei = actor("amei", Role::User);
        assert!(can_adjust_split(&ctx, &expense, &amei, None, true));
    }

    #[test]
    fn manager_removal_ordering() {
        let ctx_two = ctx(&["amei", "banai"]);
        let amei = actor("amei", Role::User);

        assert_eq!(
            check_manager_removal(&ctx_two, &amei, "cudad"),
            Err(EngineError::NotFound("manager".to_string()))
        );
        assert!(check_manager_removal(&ctx_two, &amei, "banai").is_ok());
        assert!(matches!(
            check_manager_removal(&ctx_two, &amei, "amei"),
            Err(EngineError::Unauthorized(_))
        ));
        assert!(
            check_manager_removal(&ctx_two, &actor("root", Role::Admin), "amei").is_ok()
        );

        let ctx_one = ctx(&["amei"]);
        assert_eq!(
            check_manager_removal(&ctx_one, &actor("root", Role::Admin), "amei"),
            Err(EngineError::LastManagerViolation)
        );
    }
}
