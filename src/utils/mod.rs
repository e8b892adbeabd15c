pub mod audit_logger;
pub mod content_filter;
pub mod service_error;

pub use audit_logger::{AuditAction, AuditLogger};
pub use content_filter::{check_content, ContentViolation};
pub use service_error::ServiceError;
