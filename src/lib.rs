//! Coach Onboarding: multi-step onboarding wizard service.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
