/// Notification delivery
///
/// [`notify`] stores a notification and pushes it to the recipient's open
/// notification sockets. Offline recipients see it on their next list call.
/// Assignments and invitations are also mailed when a mailer is configured.

use planboard_shared::models::{
    notification::{CreateNotification, Notification, NotificationKind},
    user::User,
};
use uuid::Uuid;

use crate::{app::AppState, mail};

/// Pushes an already stored notification to the gateway
pub async fn deliver(state: &AppState, notification: &Notification) {
    let delivered = state
        .realtime
        .publish_notification(notification.clone())
        .await;

    tracing::debug!(
        notification_id = %notification.id,
        user_id = %notification.user_id,
        delivered,
        "Notification published"
    );
}

/// Stores and delivers a notification; failures are logged and swallowed
pub async fn notify(state: &AppState, data: CreateNotification) -> Option<Notification> {
    let user_id = data.user_id;

    match Notification::create(&state.db, data).await {
        Ok(notification) => {
            deliver(state, &notification).await;
            email(state, &notification).await;
            Some(notification)
        }
        Err(e) => {
            tracing::warn!(error = %e, %user_id, "Failed to create notification");
            None
        }
    }
}

/// Mails the notification to its recipient; failures are logged
async fn email(state: &AppState, notification: &Notification) {
    let Some(mailer) = state.mailer.as_deref() else {
        return;
    };
    if mail::compose(notification).is_none() {
        return;
    }

    let recipient = match User::find_by_id(&state.db, notification.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %notification.user_id, "Failed to load mail recipient");
            return;
        }
    };

    match mail::send_notification(mailer, &recipient.email, notification).await {
        Ok(_) => tracing::debug!(notification_id = %notification.id, "Notification mailed"),
        Err(e) => tracing::warn!(error = %e, notification_id = %notification.id, "Failed to mail notification"),
    }
}

pub fn task_assigned(user_id: Uuid, task_id: Uuid, task_title: &str) -> CreateNotification {
    CreateNotification {
        user_id,
        kind: NotificationKind::TaskAssigned,
        title: "New task assigned".to_string(),
        message: format!("You have been assigned to \"{}\"", task_title),
        link: Some(format!("/tasks/{}", task_id)),
    }
}

pub fn team_invitation(user_id: Uuid, team_id: Uuid, team_name: &str) -> CreateNotification {
    CreateNotification {
        user_id,
        kind: NotificationKind::TeamInvitation,
        title: "Added to team".to_string(),
        message: format!("You have been added to the team \"{}\"", team_name),
        link: Some(format!("/teams/{}", team_id)),
    }
}

pub fn team_role_changed(
    user_id: Uuid,
    team_id: Uuid,
    team_name: &str,
    role: &str,
) -> CreateNotification {
    CreateNotification {
        user_id,
        kind: NotificationKind::TeamRoleChanged,
        title: "Team role changed".to_string(),
        message: format!("Your role in \"{}\" is now {}", team_name, role),
        link: Some(format!("/teams/{}", team_id)),
    }
}
