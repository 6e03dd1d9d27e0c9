//! Persistent run history and delivery log, backed by redb.
//!
//! This is the production implementation of [`crate::RunHistory`].

pub mod db;
pub mod record;

pub use db::StatsDb;
pub use record::{DeliveryEntry, RunRecord};
