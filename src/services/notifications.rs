//! In-app notifications with optional email copies

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        notification::{NewNotification, Notification, NotificationKind},
        page_bounds,
    },
    repository::Repository,
    services::email::EmailService,
};

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
    email: EmailService,
}

impl NotificationsService {
    pub fn new(repository: Repository, email: EmailService) -> Self {
        Self { repository, email }
    }

    /// Store a notification and, when the recipient opted in, mail it in the background
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> AppResult<Notification> {
        let notification = self
            .repository
            .notifications
            .create(&NewNotification {
                user_id,
                kind,
                title: title.into(),
                message: message.into(),
                data,
            })
            .await?;

        if self.email.is_enabled() {
            self.spawn_email(&notification);
        }

        Ok(notification)
    }

    /// Like [`notify`](Self::notify) but only logs failures; used where the
    /// triggering action has already succeeded
    pub async fn notify_quietly(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) {
        if let Err(e) = self.notify(user_id, kind, title, message, data).await {
            tracing::warn!("Failed to create {} notification for {}: {}", kind, user_id, e);
        }
    }

    fn spawn_email(&self, notification: &Notification) {
        let repository = self.repository.clone();
        let email = self.email.clone();
        let user_id = notification.user_id;
        let title = notification.title.clone();
        let message = notification.message.clone();

        tokio::spawn(async move {
            let user = match repository.users.find_by_id(user_id).await {
                Ok(Some(user)) if user.email_notifications => user,
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!("Could not load user {} for notification email: {}", user_id, e);
                    return;
                }
            };
            match email.send_notification(&user.email, &user.name, &title, &message).await {
                Ok(()) => tracing::debug!("Notification email sent to {}", user.email),
                Err(e) => tracing::warn!("Failed to send notification email to {}: {}", user.email, e),
            }
        });
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let (_, per_page, offset) = page_bounds(page, per_page);
        self.repository
            .notifications
            .list(user_id, unread_only, per_page, offset)
            .await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        self.repository.notifications.unread_count(user_id).await
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        self.repository.notifications.mark_read(id, user_id).await
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        self.repository.notifications.mark_all_read(user_id).await
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.repository.notifications.delete(id, user_id).await
    }
}
