//! Shared-expense ledger core.
//!
//! The engine owns the activity lifecycle, the participant registry, split
//! calculation with reconciliation, the authorization policy and the
//! append-only activity log. Callers construct an [`Engine`] over a
//! database connection and drive it through its async operations; every
//! mutation runs in one transaction together with its log entry.

mod activities;
mod activity_logs;
mod activity_managers;
mod error;
mod expenses;
mod group_managers;
mod groups;
mod money;
mod ops;
mod participants;
pub mod policy;
mod split;
mod splits;
mod users;

pub use activities::{Activity, ActivityStatus};
pub use activity_logs::{ActionType, LogEntry};
pub use error::EngineError;
pub use expenses::{Expense, ExpenseKind};
pub use money::{MoneyCents, RECONCILE_EPSILON, SplitValue};
pub use ops::{Engine, EngineBuilder, ExpenseDraft};
pub use participants::{Participant, SplitOption};
pub use split::{SplitInstruction, average_splits, custom_splits, eligible_participants};
pub use splits::{Split, SplitType};
pub use users::Role;

pub(crate) type ResultEngine<T> = Result<T, EngineError>;
