/// Activity log recording
///
/// Handlers call [`record`] after a mutation commits. The row is written,
/// then pushed to the activity-log gateway.

use planboard_shared::{
    auth::middleware::AuthContext,
    models::activity_log::{ActivityAction, ActivityLog, CreateActivityLog, EntityType},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::app::AppState;

/// Records one activity log row; failures are logged and swallowed
pub async fn record(
    state: &AppState,
    auth: &AuthContext,
    action: ActivityAction,
    entity_type: EntityType,
    entity_id: Uuid,
    details: JsonValue,
) {
    let entry = CreateActivityLog {
        user_id: Some(auth.user_id),
        action,
        entity_type,
        entity_id,
        details,
    };

    match ActivityLog::create(&state.db, entry).await {
        Ok(log) => {
            state.realtime.publish_activity(log).await;
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                user_id = %auth.user_id,
                ?action,
                ?entity_type,
                %entity_id,
                "Failed to record activity"
            );
        }
    }
}
