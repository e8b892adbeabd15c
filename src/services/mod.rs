// Services module for the freight marketplace core
// Business logic layer for the application

pub mod ads;
pub mod credits;
pub mod freight;
pub mod matching;
pub mod notification;
pub mod rate_limit;
pub mod slug;
pub mod verification;

// Re-export commonly used services
pub use ads::AdService;
pub use credits::CreditService;
pub use freight::FreightService;
pub use matching::MatchingService;
pub use notification::{
    AlertChannel, NotificationError, NotificationService, PushChannel, TelegramChannel,
};
pub use rate_limit::{RateLimitError, RateLimitResult, RateLimitService};
pub use slug::{SlugError, SlugGenerator};
pub use verification::VerificationService;
