// Audit logging for domain mutations
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub enum AuditAction {
    FreightCreated,
    FreightUpdated,
    FreightDeleted,
    FreightApproved,
    FreightRejected,
    DriverAssigned,
    PaymentConfirmed,
    DeliveryConfirmed,
    AdSaved,
    AdDeleted,
    AdPaused,
    CreditsGranted,
    UserVerificationChanged,
    SettingsUpdated,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub actor_id: Uuid,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLogger;

impl AuditLogger {
    /// Log an audit event for freight lifecycle operations
    pub fn log_freight_action(
        action: AuditAction,
        actor_id: Uuid,
        freight_id: Uuid,
        details: Option<String>,
    ) {
        Self::emit(action, actor_id, Some(freight_id.to_string()), "freight", details);
    }

    /// Log an audit event for ad operations
    pub fn log_ad_action(
        action: AuditAction,
        actor_id: Uuid,
        ad_id: Option<Uuid>,
        details: Option<String>,
    ) {
        Self::emit(action, actor_id, ad_id.map(|id| id.to_string()), "ad", details);
    }

    /// Log an audit event for account-level operations
    pub fn log_user_action(
        action: AuditAction,
        actor_id: Uuid,
        target_id: Uuid,
        details: Option<String>,
    ) {
        Self::emit(action, actor_id, Some(target_id.to_string()), "user", details);
    }

    /// Log an audit event for platform configuration changes
    pub fn log_settings_action(actor_id: Uuid, details: Option<String>) {
        Self::emit(AuditAction::SettingsUpdated, actor_id, None, "settings", details);
    }

    fn emit(
        action: AuditAction,
        actor_id: Uuid,
        resource_id: Option<String>,
        resource_type: &str,
        details: Option<String>,
    ) {
        let audit_log = AuditLog {
            id: Uuid::new_v4(),
            action,
            actor_id,
            resource_id,
            resource_type: resource_type.to_string(),
            details,
            timestamp: Utc::now(),
        };

        let json_log = serde_json::to_string(&audit_log).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", audit_log)
        });

        info!(target: "audit", "{}", json_log);
    }
}
