//! # CoursePulse Common Library
//!
//! Shared code for the CoursePulse demand engine:
//! - Database initialization, models and the options store
//! - Semester identifiers and add/drop window estimation
//! - Process-wide demand cache with advisory locks
//! - Error types and configuration loading

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod semester;
pub mod time;

pub use error::{Error, Result};
pub use semester::Semester;
pub use time::Clock;
