/// Realtime WebSocket gateways
///
/// Two gateways push server events to connected clients:
///
/// - `GET /ws/activity-logs?token=<access>`: every recorded activity log row,
///   delivered to admin connections
/// - `GET /ws/notifications?token=<access>`: each user's new notifications
///
/// Frames are JSON text:
///
/// ```text
/// {"event":"activityLog","data":{...}}
/// {"event":"notification","data":{...}}
/// ```

pub mod gateway;
pub mod hub;

use planboard_shared::models::{activity_log::ActivityLog, notification::Notification};
use serde::Serialize;

use hub::ConnectionHub;

/// Event pushed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RealtimeEvent {
    ActivityLog(ActivityLog),
    Notification(Notification),
}

impl RealtimeEvent {
    /// Encodes the event as a text frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The two gateway hubs
#[derive(Debug, Clone)]
pub struct Realtime {
    pub activity: ConnectionHub,
    pub notifications: ConnectionHub,
}

impl Realtime {
    pub fn new() -> Self {
        Self {
            activity: ConnectionHub::new("activity-logs"),
            notifications: ConnectionHub::new("notifications"),
        }
    }

    /// Pushes an activity log row to admin connections
    pub async fn publish_activity(&self, log: ActivityLog) -> usize {
        self.activity
            .broadcast_admins(&RealtimeEvent::ActivityLog(log))
            .await
    }

    /// Pushes a notification to its recipient's connections
    pub async fn publish_notification(&self, notification: Notification) -> usize {
        let user_id = notification.user_id;
        self.notifications
            .send_to_user(user_id, &RealtimeEvent::Notification(notification))
            .await
    }
}

impl Default for Realtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use planboard_shared::models::activity_log::{ActivityAction, EntityType};
    use serde_json::json;
    use uuid::Uuid;

    fn activity_log() -> ActivityLog {
        ActivityLog {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            action: ActivityAction::Create,
            entity_type: EntityType::Project,
            entity_id: Uuid::new_v4(),
            details: json!({ "name": "Launch" }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_activity_frame_format() {
        let frame = RealtimeEvent::ActivityLog(activity_log()).to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["event"], "activityLog");
        assert_eq!(value["data"]["action"], "create");
        assert_eq!(value["data"]["entity_type"], "project");
        assert_eq!(value["data"]["details"]["name"], "Launch");
    }

    #[tokio::test]
    async fn test_publish_activity_reaches_admins_only() {
        let realtime = Realtime::new();
        let (_, mut admin) = realtime.activity.register(Uuid::new_v4(), true).await;
        let (_, mut user) = realtime.activity.register(Uuid::new_v4(), false).await;

        assert_eq!(realtime.publish_activity(activity_log()).await, 1);
        assert!(admin.try_recv().is_ok());
        assert!(user.try_recv().is_err());
    }
}
