//! Business logic services.

pub mod builder;
pub mod delivery;
pub mod fingerprint;
pub mod history;
pub mod lifecycle;
pub mod notification;
pub mod schedule;
pub mod sweep;
