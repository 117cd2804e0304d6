use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{ActionType, EngineError, LogEntry, ResultEngine, activity_logs};

use super::{Engine, with_tx};

impl Engine {
    /// Appends one audit row. Callers invoke this inside the same transaction
    /// as the mutation it describes.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn append_log(
        &self,
        db: &DatabaseTransaction,
        activity_id: Uuid,
        action: ActionType,
        description: String,
        operator: Option<&str>,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            activity_id,
            action,
            description,
            operator: operator.map(ToString::to_string),
            metadata,
            timestamp: now,
        };
        let active: activity_logs::ActiveModel = (&entry).try_into()?;
        active.insert(db).await?;
        Ok(())
    }

    /// Lists the activity's audit trail, newest first.
    pub async fn activity_logs(
        &self,
        activity_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<LogEntry>> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, user_id).await?;
            let ctx = self.load_activity_ctx(&db_tx, activity_id).await?;
            if !self.can_view_activity(&db_tx, &ctx, &actor).await? {
                return Err(EngineError::Unauthorized(
                    "not allowed to view this activity".to_string(),
                ));
            }

            let rows = activity_logs::Entity::find()
                .filter(activity_logs::Column::ActivityId.eq(activity_id.to_string()))
                .order_by_desc(activity_logs::Column::Timestamp)
                .all(&db_tx)
                .await?;
            rows.into_iter().map(LogEntry::try_from).collect()
        })
    }
}
