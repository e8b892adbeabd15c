// Notification dispatcher: durable in-app rows plus best-effort external alerts

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::{NewNotification, Notification, NotificationRequest};
use crate::utils::ServiceError;

/// Outbound HTTP calls give up quickly so a slow provider cannot stall requests
const CHANNEL_TIMEOUT: Duration = Duration::from_secs(5);

/// Read rows older than this are eligible for cleanup
const CLEANUP_AGE_DAYS: i64 = 30;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Channel delivery failed: {0}")]
    Delivery(String),
}

// =============================================================================
// ALERT CHANNELS
// =============================================================================

/// Payload handed to external channels. Borrowed from the originating
/// request so channels cannot mutate what gets persisted.
pub struct OutboundAlert<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub action_url: Option<&'a str>,
    pub push_token: Option<&'a str>,
}

/// Common seam for external delivery transports
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, alert: &OutboundAlert<'_>) -> Result<(), NotificationError>;
}

/// Telegram bot webhook pointed at a fixed operations chat
pub struct TelegramChannel {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: build_channel_client(),
            bot_token,
            chat_id,
        }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, alert: &OutboundAlert<'_>) -> Result<(), NotificationError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": format_alert_text(alert),
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(format!("telegram request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotificationError::Delivery(format!(
                "telegram returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Push provider reached over plain HTTP with a bearer key
pub struct PushChannel {
    client: Client,
    api_url: String,
    api_key: String,
}

impl PushChannel {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: build_channel_client(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl AlertChannel for PushChannel {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn deliver(&self, alert: &OutboundAlert<'_>) -> Result<(), NotificationError> {
        // No registered device means nothing to do
        let Some(token) = alert.push_token else {
            return Ok(());
        };

        let payload = serde_json::json!({
            "to": token,
            "title": alert.title,
            "body": alert.message,
            "url": alert.action_url,
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(format!("push request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotificationError::Delivery(format!(
                "push provider returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

fn build_channel_client() -> Client {
    Client::builder()
        .timeout(CHANNEL_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Single line per section keeps Telegram formatting predictable
fn format_alert_text(alert: &OutboundAlert<'_>) -> String {
    let mut text = format!("{}\n{}", alert.title, alert.message);
    if let Some(action) = alert.action_url {
        text.push('\n');
        text.push_str(action);
    }
    text
}

// =============================================================================
// NOTIFICATION SERVICE
// =============================================================================

pub struct NotificationService {
    pool: DieselPool,
    telegram: Option<TelegramChannel>,
    push: Option<PushChannel>,
}

impl NotificationService {
    /// Dispatcher without external channels, in-app rows only
    pub fn new(pool: DieselPool) -> Self {
        Self {
            pool,
            telegram: None,
            push: None,
        }
    }

    pub fn with_channels(
        pool: DieselPool,
        telegram: Option<TelegramChannel>,
        push: Option<PushChannel>,
    ) -> Self {
        Self {
            pool,
            telegram,
            push,
        }
    }

    /// Persist and fan out one notification. Only the database insert decides
    /// the outcome; channel failures are logged and swallowed.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, kind = request.kind.as_str()))]
    pub async fn send(
        &self,
        request: NotificationRequest,
    ) -> Result<Notification, NotificationError> {
        let wants_alert = request.wants_external_alert();
        let row: NewNotification = request.clone().into_row();

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| NotificationError::Pool(e.to_string()))?;

        // 1. Durable in-app row
        let stored: Notification = diesel::insert_into(crate::schema::notifications::table)
            .values(&row)
            .returning(Notification::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to persist notification for {}: {}", request.user_id, e);
                NotificationError::Database(e)
            })?;

        // 2. Urgent and match traffic also goes to the messaging webhook
        if wants_alert {
            if let Some(telegram) = &self.telegram {
                let alert = OutboundAlert {
                    title: &request.title,
                    message: &request.message,
                    action_url: request.action_url.as_deref(),
                    push_token: None,
                };
                if let Err(e) = telegram.deliver(&alert).await {
                    warn!("Alert channel {} failed: {}", telegram.name(), e);
                }
            }
        }

        // 3. Device push when the user registered a token
        if let Some(push) = &self.push {
            match load_push_token(&mut conn, request.user_id).await {
                Ok(Some(token)) => {
                    let alert = OutboundAlert {
                        title: &request.title,
                        message: &request.message,
                        action_url: request.action_url.as_deref(),
                        push_token: Some(&token),
                    };
                    if let Err(e) = push.deliver(&alert).await {
                        warn!("Alert channel {} failed: {}", push.name(), e);
                    }
                },
                Ok(None) => {},
                Err(e) => {
                    warn!("Could not load push token for {}: {}", request.user_id, e);
                },
            }
        }

        Ok(stored)
    }

    /// Drain an outbox collected during a transaction. Failures are logged
    /// per request and never interrupt the rest of the batch.
    pub async fn dispatch_all(&self, requests: Vec<NotificationRequest>) {
        for request in requests {
            let user_id = request.user_id;
            if let Err(e) = self.send(request).await {
                error!("Failed to dispatch notification to {}: {}", user_id, e);
            }
        }
    }

    // =========================================================================
    // READ MODEL
    // =========================================================================

    /// Latest notifications for the user's inbox view
    pub async fn list_for_user(&self, user: Uuid) -> Result<Vec<Notification>, ServiceError> {
        use crate::schema::notifications::dsl;

        let mut conn = self.pool.get().await?;
        let rows = dsl::notifications
            .filter(dsl::user_id.eq(user))
            .order(dsl::created_at.desc())
            .limit(20)
            .select(Notification::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    /// Unread notifications, newest first
    pub async fn unread_for_user(&self, user: Uuid) -> Result<Vec<Notification>, ServiceError> {
        use crate::schema::notifications::dsl;

        let mut conn = self.pool.get().await?;
        let rows = dsl::notifications
            .filter(dsl::user_id.eq(user))
            .filter(dsl::is_read.eq(false))
            .order(dsl::created_at.desc())
            .limit(50)
            .select(Notification::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user: Uuid) -> Result<i64, ServiceError> {
        use crate::schema::notifications::dsl;

        let mut conn = self.pool.get().await?;
        let count = dsl::notifications
            .filter(dsl::user_id.eq(user))
            .filter(dsl::is_read.eq(false))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count)
    }

    /// Mark one notification read. Scoped to the owner so one user cannot
    /// touch another's rows; returns whether a row was updated.
    pub async fn mark_read(&self, id: Uuid, user: Uuid) -> Result<bool, ServiceError> {
        use crate::schema::notifications::dsl;

        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            dsl::notifications
                .filter(dsl::id.eq(id))
                .filter(dsl::user_id.eq(user)),
        )
        .set(dsl::is_read.eq(true))
        .execute(&mut conn)
        .await?;
        Ok(updated > 0)
    }

    pub async fn mark_all_read(&self, user: Uuid) -> Result<usize, ServiceError> {
        use crate::schema::notifications::dsl;

        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            dsl::notifications
                .filter(dsl::user_id.eq(user))
                .filter(dsl::is_read.eq(false)),
        )
        .set(dsl::is_read.eq(true))
        .execute(&mut conn)
        .await?;
        Ok(updated)
    }

    /// Maintenance entry point: drop read rows past the retention window
    #[instrument(skip(self))]
    pub async fn cleanup_old(&self) -> Result<usize, ServiceError> {
        use crate::schema::notifications::dsl;

        let cutoff = chrono::Utc::now() - chrono::Duration::days(CLEANUP_AGE_DAYS);
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(
            dsl::notifications
                .filter(dsl::is_read.eq(true))
                .filter(dsl::created_at.lt(cutoff)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted)
    }
}

async fn load_push_token(
    conn: &mut AsyncPgConnection,
    user: Uuid,
) -> Result<Option<String>, diesel::result::Error> {
    use crate::schema::users::dsl;

    let token = dsl::users
        .filter(dsl::id.eq(user))
        .filter(dsl::deleted_at.is_null())
        .select(dsl::push_token)
        .first::<Option<String>>(conn)
        .await
        .optional()?;

    Ok(token.flatten())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_text_includes_action_url() {
        let alert = OutboundAlert {
            title: "Carga compatível!",
            message: "Nova carga de soja disponível.",
            action_url: Some("/freight/details/soja-de-sorriso-para-paranagua-a1b2c3"),
            push_token: None,
        };

        let text = format_alert_text(&alert);
        assert!(text.starts_with("Carga compatível!\n"));
        assert!(text.contains("Nova carga de soja disponível."));
        assert!(text.ends_with("-a1b2c3"));
    }

    #[test]
    fn test_alert_text_without_action_url() {
        let alert = OutboundAlert {
            title: "Perfil Verificado!",
            message: "Seu perfil agora exibe o selo de verificação.",
            action_url: None,
            push_token: None,
        };

        let text = format_alert_text(&alert);
        assert_eq!(text.lines().count(), 2);
    }
}
