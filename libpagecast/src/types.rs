//! Core types for Pagecast

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The two supported publishing destinations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    Facebook,
    Instagram,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Facebook => "facebook",
            PlatformKind::Instagram => "instagram",
        }
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(PlatformKind::Facebook),
            "instagram" => Ok(PlatformKind::Instagram),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid options: facebook, instagram",
                s
            )),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            _ => Err(format!(
                "Unknown media type: '{}'. Valid options: image, video",
                s
            )),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One connected destination (a Facebook Page or an Instagram Business
/// Account) for one user.
///
/// `page_access_token` is the capability credential scoped to this specific
/// account; without it the connection is read-only and publishing is
/// refused before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: String,
    pub user_id: String,
    pub platform: PlatformKind,
    /// Platform-native identifier (Page ID or Business Account ID)
    pub account_id: String,
    pub display_name: String,
    pub page_access_token: Option<String>,
    pub created_at: i64,
}

impl SocialAccount {
    pub fn new(
        user_id: String,
        platform: PlatformKind,
        account_id: String,
        display_name: String,
        page_access_token: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            platform,
            account_id,
            display_name,
            page_access_token,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether this connection can publish at all
    pub fn is_publishable(&self) -> bool {
        self.page_access_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}

/// One user's registered application plus the user-level long-lived token.
///
/// The long-lived user token is used to enumerate pages and fetch insights;
/// it is never the token that publishes. One credential per (user, platform)
/// pair, looked up by platform key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredential {
    pub id: String,
    pub user_id: String,
    pub platform: PlatformKind,
    pub app_id: String,
    pub app_secret: String,
    pub long_lived_token: Option<String>,
    pub created_at: i64,
}

impl ApiCredential {
    pub fn new(
        user_id: String,
        platform: PlatformKind,
        app_id: String,
        app_secret: String,
        long_lived_token: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            platform,
            app_id,
            app_secret,
            long_lived_token,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// A unit of bulk publishing work: one piece of content, many targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostJob {
    pub id: String,
    pub user_id: String,
    pub caption: Option<String>,
    pub media_url: String,
    pub media_type: MediaType,
    pub status: JobStatus,
    pub success_count: i64,
    pub failure_count: i64,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl PostJob {
    pub fn new(
        user_id: String,
        caption: Option<String>,
        media_url: String,
        media_type: MediaType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            caption,
            media_url,
            media_type,
            status: JobStatus::Pending,
            success_count: 0,
            failure_count: 0,
            created_at: chrono::Utc::now().timestamp(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutcomeStatus {
    Fulfilled,
    Rejected,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Fulfilled => "fulfilled",
            OutcomeStatus::Rejected => "rejected",
        }
    }
}

/// Per-target outcome record of one publish attempt within a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResult {
    pub job_id: String,
    /// Position of this target in the job's target list
    pub position: i64,
    /// Social account id, or `"system"` for a synthetic orchestration failure
    pub account_id: String,
    pub status: OutcomeStatus,
    pub post_id: Option<String>,
    pub error_message: Option<String>,
}

impl TargetResult {
    pub fn fulfilled(job_id: String, position: i64, account_id: String, post_id: String) -> Self {
        Self {
            job_id,
            position,
            account_id,
            status: OutcomeStatus::Fulfilled,
            post_id: Some(post_id),
            error_message: None,
        }
    }

    pub fn rejected(job_id: String, position: i64, account_id: String, reason: String) -> Self {
        Self {
            job_id,
            position,
            account_id,
            status: OutcomeStatus::Rejected,
            post_id: None,
            error_message: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleStatus {
    Scheduled,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Failed => "failed",
        }
    }
}

/// A unit of deferred publishing work, executed when its time has passed.
///
/// Fully published posts are deleted rather than kept; a post with any
/// failed target is kept with status `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub user_id: String,
    pub caption: Option<String>,
    pub media_url: String,
    pub media_type: MediaType,
    /// Social account ids this post publishes to, in order
    pub target_ids: Vec<String>,
    /// Unix seconds
    pub scheduled_at: i64,
    pub status: ScheduleStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
}

impl ScheduledPost {
    pub fn new(
        user_id: String,
        caption: Option<String>,
        media_url: String,
        media_type: MediaType,
        target_ids: Vec<String>,
        scheduled_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            caption,
            media_url,
            media_type,
            target_ids,
            scheduled_at,
            status: ScheduleStatus::Scheduled,
            error_message: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}
