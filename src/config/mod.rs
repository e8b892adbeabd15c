// Configuration modules for the marketplace backend

pub mod permissions;
pub mod pricing;

pub use permissions::{Action, PolicyTable};
pub use pricing::PricingConfig;
