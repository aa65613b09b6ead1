//! Pagecast - Unix tools for Page and Business Account publishing
//!
//! This library provides core functionality for publishing media posts to
//! Facebook Pages and Instagram Business Accounts following Unix
//! philosophy principles.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod orchestrator;
pub mod publisher;
pub mod scheduling;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::{Database, JobTargetRow, JobWithTargets};
pub use error::{GraphError, PagecastError, Result};
pub use executor::{ExecutionReport, ScheduleExecutor};
pub use graph::GraphClient;
pub use orchestrator::JobProcessor;
pub use publisher::{GraphPublisherFactory, PublisherFactory};
pub use types::{JobStatus, MediaType, PlatformKind, PostJob, ScheduledPost, SocialAccount};
