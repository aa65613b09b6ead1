//! Database operations for Pagecast
//!
//! The document-store collections of the hosted dashboard map onto per-user
//! sqlite tables. Writes are last-write-wins at the row level except for the
//! job lease, which is a conditional update.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{
    ApiCredential, JobStatus, MediaType, OutcomeStatus, PlatformKind, PostJob, ScheduleStatus,
    ScheduledPost, SocialAccount, TargetResult,
};

/// A job with its settled (or still-pending) per-target rows
#[derive(Debug, Clone)]
pub struct JobWithTargets {
    pub job: PostJob,
    pub targets: Vec<JobTargetRow>,
}

/// One row of `job_targets`; `status` is None until the target settles
#[derive(Debug, Clone)]
pub struct JobTargetRow {
    pub job_id: String,
    pub position: i64,
    pub account_id: String,
    pub status: Option<OutcomeStatus>,
    pub post_id: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Use mode=rwc to allow creating the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Social accounts
    // ------------------------------------------------------------------

    pub async fn create_social_account(&self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts (id, user_id, platform, account_id, display_name, page_access_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(account.platform.as_str())
        .bind(&account.account_id)
        .bind(&account.display_name)
        .bind(&account.page_access_token)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_social_account(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, account_id, display_name, page_access_token, created_at
            FROM social_accounts WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(social_account_from_row))
    }

    pub async fn list_social_accounts(&self, user_id: &str) -> Result<Vec<SocialAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, platform, account_id, display_name, page_access_token, created_at
            FROM social_accounts WHERE user_id = ? ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.into_iter().map(social_account_from_row).collect())
    }

    /// Replace an account's page token after a refresh
    pub async fn update_account_token(
        &self,
        user_id: &str,
        id: &str,
        page_access_token: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE social_accounts SET page_access_token = ? WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(page_access_token)
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // API credentials (keyed by platform, one per user+platform)
    // ------------------------------------------------------------------

    pub async fn upsert_api_credential(&self, credential: &ApiCredential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_credentials (id, user_id, platform, app_id, app_secret, long_lived_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, platform) DO UPDATE SET
                app_id = excluded.app_id,
                app_secret = excluded.app_secret,
                long_lived_token = excluded.long_lived_token
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.user_id)
        .bind(credential.platform.as_str())
        .bind(&credential.app_id)
        .bind(&credential.app_secret)
        .bind(&credential.long_lived_token)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_api_credential(
        &self,
        user_id: &str,
        platform: PlatformKind,
    ) -> Result<Option<ApiCredential>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, app_id, app_secret, long_lived_token, created_at
            FROM api_credentials WHERE user_id = ? AND platform = ?
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| ApiCredential {
            id: r.get("id"),
            user_id: r.get("user_id"),
            platform: platform_from_str(&r.get::<String, _>("platform")),
            app_id: r.get("app_id"),
            app_secret: r.get("app_secret"),
            long_lived_token: r.get("long_lived_token"),
            created_at: r.get("created_at"),
        }))
    }

    // ------------------------------------------------------------------
    // Post jobs
    // ------------------------------------------------------------------

    /// Create a job together with its target rows in one transaction
    pub async fn create_post_job(&self, job: &PostJob, target_account_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO post_jobs (id, user_id, caption, media_url, media_type, status, success_count, failure_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.user_id)
        .bind(&job.caption)
        .bind(&job.media_url)
        .bind(job.media_type.as_str())
        .bind(job.status.as_str())
        .bind(job.success_count)
        .bind(job.failure_count)
        .bind(job.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        for (position, account_id) in target_account_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO job_targets (job_id, position, account_id)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&job.id)
            .bind(position as i64)
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn get_post_job(&self, user_id: &str, job_id: &str) -> Result<Option<PostJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, caption, media_url, media_type, status,
                   success_count, failure_count, created_at, completed_at
            FROM post_jobs WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(user_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(post_job_from_row))
    }

    pub async fn get_job_targets(&self, job_id: &str) -> Result<Vec<JobTargetRow>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, position, account_id, status, post_id, error_message
            FROM job_targets WHERE job_id = ? ORDER BY position
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| JobTargetRow {
                job_id: r.get("job_id"),
                position: r.get("position"),
                account_id: r.get("account_id"),
                status: r
                    .get::<Option<String>, _>("status")
                    .map(|s| outcome_from_str(&s)),
                post_id: r.get("post_id"),
                error_message: r.get("error_message"),
            })
            .collect())
    }

    pub async fn get_job_with_targets(
        &self,
        user_id: &str,
        job_id: &str,
    ) -> Result<Option<JobWithTargets>> {
        match self.get_post_job(user_id, job_id).await? {
            Some(job) => {
                let targets = self.get_job_targets(job_id).await?;
                Ok(Some(JobWithTargets { job, targets }))
            }
            None => Ok(None),
        }
    }

    /// Jobs still waiting for a worker, oldest first
    pub async fn list_pending_jobs(&self, user_id: &str) -> Result<Vec<PostJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, caption, media_url, media_type, status,
                   success_count, failure_count, created_at, completed_at
            FROM post_jobs WHERE user_id = ? AND status = 'pending'
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.into_iter().map(post_job_from_row).collect())
    }

    /// Conditionally take the processing lease for a job.
    ///
    /// Succeeds only while the job is still pending and no live lease is
    /// held by anyone else; returns false when another worker owns it.
    pub async fn try_acquire_job_lease(
        &self,
        user_id: &str,
        job_id: &str,
        holder: &str,
        lease_secs: i64,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE post_jobs
            SET processing_by = ?, lease_expires_at = ?
            WHERE user_id = ? AND id = ? AND status = 'pending'
              AND (processing_by IS NULL OR lease_expires_at < ?)
            "#,
        )
        .bind(holder)
        .bind(now + lease_secs)
        .bind(user_id)
        .bind(job_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// The single terminal write: settle every target row, set the
    /// aggregate counters and final status, release the lease.
    pub async fn finalize_post_job(
        &self,
        user_id: &str,
        job_id: &str,
        status: JobStatus,
        results: &[TargetResult],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        for result in results {
            sqlx::query(
                r#"
                INSERT INTO job_targets (job_id, position, account_id, status, post_id, error_message)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (job_id, position) DO UPDATE SET
                    account_id = excluded.account_id,
                    status = excluded.status,
                    post_id = excluded.post_id,
                    error_message = excluded.error_message
                "#,
            )
            .bind(&result.job_id)
            .bind(result.position)
            .bind(&result.account_id)
            .bind(result.status.as_str())
            .bind(&result.post_id)
            .bind(&result.error_message)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        let success_count = results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Fulfilled)
            .count() as i64;
        let failure_count = results.len() as i64 - success_count;

        sqlx::query(
            r#"
            UPDATE post_jobs
            SET status = ?, success_count = ?, failure_count = ?,
                completed_at = ?, processing_by = NULL, lease_expires_at = NULL
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(success_count)
        .bind(failure_count)
        .bind(chrono::Utc::now().timestamp())
        .bind(user_id)
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scheduled posts
    // ------------------------------------------------------------------

    pub async fn create_scheduled_post(&self, post: &ScheduledPost) -> Result<()> {
        let target_ids = serde_json::to_string(&post.target_ids)
            .map_err(|e| crate::error::PagecastError::InvalidInput(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts (id, user_id, caption, media_url, media_type, target_ids, scheduled_at, status, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.caption)
        .bind(&post.media_url)
        .bind(post.media_type.as_str())
        .bind(target_ids)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(&post.error_message)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_scheduled_post(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, caption, media_url, media_type, target_ids, scheduled_at, status, error_message, created_at
            FROM scheduled_posts WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(scheduled_post_from_row))
    }

    /// Scheduled posts whose time has passed, in scheduled order
    pub async fn due_scheduled_posts(&self, user_id: &str, now: i64) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, caption, media_url, media_type, target_ids, scheduled_at, status, error_message, created_at
            FROM scheduled_posts
            WHERE user_id = ? AND status = 'scheduled' AND scheduled_at <= ?
            ORDER BY scheduled_at
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.into_iter().map(scheduled_post_from_row).collect())
    }

    pub async fn list_scheduled_posts(&self, user_id: &str) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, caption, media_url, media_type, target_ids, scheduled_at, status, error_message, created_at
            FROM scheduled_posts WHERE user_id = ? ORDER BY scheduled_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.into_iter().map(scheduled_post_from_row).collect())
    }

    /// Fully published posts leave no record behind
    pub async fn delete_scheduled_post(&self, user_id: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM scheduled_posts WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn mark_scheduled_post_failed(
        &self,
        user_id: &str,
        id: &str,
        error_message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts SET status = 'failed', error_message = ?
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(error_message)
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }
}

fn platform_from_str(s: &str) -> PlatformKind {
    match s {
        "instagram" => PlatformKind::Instagram,
        _ => PlatformKind::Facebook,
    }
}

fn outcome_from_str(s: &str) -> OutcomeStatus {
    match s {
        "fulfilled" => OutcomeStatus::Fulfilled,
        _ => OutcomeStatus::Rejected,
    }
}

fn media_type_from_str(s: &str) -> MediaType {
    match s {
        "video" => MediaType::Video,
        _ => MediaType::Image,
    }
}

fn social_account_from_row(r: sqlx::sqlite::SqliteRow) -> SocialAccount {
    SocialAccount {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: platform_from_str(&r.get::<String, _>("platform")),
        account_id: r.get("account_id"),
        display_name: r.get("display_name"),
        page_access_token: r.get("page_access_token"),
        created_at: r.get("created_at"),
    }
}

fn post_job_from_row(r: sqlx::sqlite::SqliteRow) -> PostJob {
    PostJob {
        id: r.get("id"),
        user_id: r.get("user_id"),
        caption: r.get("caption"),
        media_url: r.get("media_url"),
        media_type: media_type_from_str(&r.get::<String, _>("media_type")),
        status: match r.get::<String, _>("status").as_str() {
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        },
        success_count: r.get("success_count"),
        failure_count: r.get("failure_count"),
        created_at: r.get("created_at"),
        completed_at: r.get("completed_at"),
    }
}

fn scheduled_post_from_row(r: sqlx::sqlite::SqliteRow) -> ScheduledPost {
    ScheduledPost {
        id: r.get("id"),
        user_id: r.get("user_id"),
        caption: r.get("caption"),
        media_url: r.get("media_url"),
        media_type: media_type_from_str(&r.get::<String, _>("media_type")),
        target_ids: serde_json::from_str(&r.get::<String, _>("target_ids")).unwrap_or_default(),
        scheduled_at: r.get("scheduled_at"),
        status: match r.get::<String, _>("status").as_str() {
            "failed" => ScheduleStatus::Failed,
            _ => ScheduleStatus::Scheduled,
        },
        error_message: r.get("error_message"),
        created_at: r.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(&path.to_string_lossy()).await.unwrap();
        (dir, db)
    }

    fn account(user: &str, token: Option<&str>) -> SocialAccount {
        SocialAccount::new(
            user.to_string(),
            PlatformKind::Facebook,
            "page-123".to_string(),
            "My Page".to_string(),
            token.map(|t| t.to_string()),
        )
    }

    #[tokio::test]
    async fn test_social_account_round_trip() {
        let (_dir, db) = test_db().await;
        let account = account("user-1", Some("EAAB"));
        db.create_social_account(&account).await.unwrap();

        let loaded = db
            .get_social_account("user-1", &account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.display_name, "My Page");
        assert_eq!(loaded.platform, PlatformKind::Facebook);
        assert_eq!(loaded.page_access_token, Some("EAAB".to_string()));
    }

    #[tokio::test]
    async fn test_social_account_scoped_to_user() {
        let (_dir, db) = test_db().await;
        let account = account("user-1", None);
        db.create_social_account(&account).await.unwrap();

        assert!(db
            .get_social_account("user-2", &account.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_account_token() {
        let (_dir, db) = test_db().await;
        let account = account("user-1", None);
        db.create_social_account(&account).await.unwrap();

        db.update_account_token("user-1", &account.id, Some("EAAB-new"))
            .await
            .unwrap();

        let loaded = db
            .get_social_account("user-1", &account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.page_access_token, Some("EAAB-new".to_string()));
    }

    #[tokio::test]
    async fn test_api_credential_keyed_by_platform() {
        let (_dir, db) = test_db().await;
        let cred = ApiCredential::new(
            "user-1".to_string(),
            PlatformKind::Facebook,
            "app-1".to_string(),
            "secret-1".to_string(),
            Some("long-lived".to_string()),
        );
        db.upsert_api_credential(&cred).await.unwrap();

        let loaded = db
            .get_api_credential("user-1", PlatformKind::Facebook)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.app_id, "app-1");

        // Lookup by the other platform key is a distinct slot
        assert!(db
            .get_api_credential("user-1", PlatformKind::Instagram)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_api_credential_upsert_replaces() {
        let (_dir, db) = test_db().await;
        let first = ApiCredential::new(
            "user-1".to_string(),
            PlatformKind::Facebook,
            "app-1".to_string(),
            "secret-1".to_string(),
            None,
        );
        db.upsert_api_credential(&first).await.unwrap();

        let second = ApiCredential::new(
            "user-1".to_string(),
            PlatformKind::Facebook,
            "app-1".to_string(),
            "secret-1".to_string(),
            Some("refreshed".to_string()),
        );
        db.upsert_api_credential(&second).await.unwrap();

        let loaded = db
            .get_api_credential("user-1", PlatformKind::Facebook)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.long_lived_token, Some("refreshed".to_string()));
    }

    #[tokio::test]
    async fn test_post_job_with_targets() {
        let (_dir, db) = test_db().await;
        let job = PostJob::new(
            "user-1".to_string(),
            Some("caption".to_string()),
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
        );
        db.create_post_job(&job, &["acct-1".to_string(), "acct-2".to_string()])
            .await
            .unwrap();

        let loaded = db.get_job_with_targets("user-1", &job.id).await.unwrap().unwrap();
        assert_eq!(loaded.job.status, JobStatus::Pending);
        assert_eq!(loaded.targets.len(), 2);
        assert_eq!(loaded.targets[0].position, 0);
        assert_eq!(loaded.targets[1].account_id, "acct-2");
        assert!(loaded.targets[0].status.is_none());
    }

    #[tokio::test]
    async fn test_job_lease_is_exclusive() {
        let (_dir, db) = test_db().await;
        let job = PostJob::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
        );
        db.create_post_job(&job, &["acct-1".to_string()]).await.unwrap();

        assert!(db
            .try_acquire_job_lease("user-1", &job.id, "worker-a", 300)
            .await
            .unwrap());
        // Second worker is refused while the lease is live
        assert!(!db
            .try_acquire_job_lease("user-1", &job.id, "worker-b", 300)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_job_lease_expires() {
        let (_dir, db) = test_db().await;
        let job = PostJob::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
        );
        db.create_post_job(&job, &["acct-1".to_string()]).await.unwrap();

        // Negative duration puts the expiry in the past immediately
        assert!(db
            .try_acquire_job_lease("user-1", &job.id, "worker-a", -10)
            .await
            .unwrap());
        assert!(db
            .try_acquire_job_lease("user-1", &job.id, "worker-b", 300)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_finalize_post_job_counts_and_lease_release() {
        let (_dir, db) = test_db().await;
        let job = PostJob::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
        );
        db.create_post_job(&job, &["acct-1".to_string(), "acct-2".to_string()])
            .await
            .unwrap();
        db.try_acquire_job_lease("user-1", &job.id, "worker-a", 300)
            .await
            .unwrap();

        let results = vec![
            TargetResult::fulfilled(job.id.clone(), 0, "acct-1".to_string(), "123_456".to_string()),
            TargetResult::rejected(
                job.id.clone(),
                1,
                "acct-2".to_string(),
                "Missing Page Access Token".to_string(),
            ),
        ];
        db.finalize_post_job("user-1", &job.id, JobStatus::Failed, &results)
            .await
            .unwrap();

        let loaded = db.get_job_with_targets("user-1", &job.id).await.unwrap().unwrap();
        assert_eq!(loaded.job.status, JobStatus::Failed);
        assert_eq!(loaded.job.success_count, 1);
        assert_eq!(loaded.job.failure_count, 1);
        assert!(loaded.job.completed_at.is_some());
        assert_eq!(loaded.targets.len(), 2);
        assert_eq!(loaded.targets[0].status, Some(OutcomeStatus::Fulfilled));
        assert_eq!(loaded.targets[0].post_id, Some("123_456".to_string()));
        assert_eq!(loaded.targets[1].status, Some(OutcomeStatus::Rejected));

        // Lease is released with the terminal write; job is no longer
        // pending so a new lease cannot be taken either
        assert!(!db
            .try_acquire_job_lease("user-1", &job.id, "worker-b", 300)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_finalize_with_synthetic_system_result() {
        let (_dir, db) = test_db().await;
        let job = PostJob::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
        );
        db.create_post_job(&job, &[]).await.unwrap();

        let results = vec![TargetResult::rejected(
            job.id.clone(),
            0,
            "system".to_string(),
            "database write failed".to_string(),
        )];
        db.finalize_post_job("user-1", &job.id, JobStatus::Failed, &results)
            .await
            .unwrap();

        let loaded = db.get_job_with_targets("user-1", &job.id).await.unwrap().unwrap();
        assert_eq!(loaded.targets.len(), 1);
        assert_eq!(loaded.targets[0].account_id, "system");
    }

    #[tokio::test]
    async fn test_list_pending_jobs_ordering() {
        let (_dir, db) = test_db().await;
        let mut first = PostJob::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
        );
        first.created_at = 100;
        let mut second = first.clone();
        second.id = uuid::Uuid::new_v4().to_string();
        second.created_at = 200;

        db.create_post_job(&second, &[]).await.unwrap();
        db.create_post_job(&first, &[]).await.unwrap();

        let pending = db.list_pending_jobs("user-1").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
    }

    #[tokio::test]
    async fn test_scheduled_post_due_query() {
        let (_dir, db) = test_db().await;
        let now = chrono::Utc::now().timestamp();

        let due = ScheduledPost::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
            vec!["acct-1".to_string()],
            now - 60,
        );
        let future = ScheduledPost::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/b.jpg".to_string(),
            MediaType::Image,
            vec!["acct-1".to_string()],
            now + 3600,
        );
        db.create_scheduled_post(&due).await.unwrap();
        db.create_scheduled_post(&future).await.unwrap();

        let found = db.due_scheduled_posts("user-1", now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
        assert_eq!(found[0].target_ids, vec!["acct-1".to_string()]);
    }

    #[tokio::test]
    async fn test_scheduled_post_delete() {
        let (_dir, db) = test_db().await;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
            vec!["acct-1".to_string()],
            0,
        );
        db.create_scheduled_post(&post).await.unwrap();
        db.delete_scheduled_post("user-1", &post.id).await.unwrap();

        assert!(db
            .get_scheduled_post("user-1", &post.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_scheduled_post_mark_failed_leaves_record() {
        let (_dir, db) = test_db().await;
        let post = ScheduledPost::new(
            "user-1".to_string(),
            None,
            "https://cdn.example.com/a.jpg".to_string(),
            MediaType::Image,
            vec!["acct-1".to_string()],
            0,
        );
        db.create_scheduled_post(&post).await.unwrap();
        db.mark_scheduled_post_failed("user-1", &post.id, "publish failed")
            .await
            .unwrap();

        let loaded = db
            .get_scheduled_post("user-1", &post.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Failed);
        assert_eq!(loaded.error_message, Some("publish failed".to_string()));

        // Failed posts are no longer picked up as due
        let due = db
            .due_scheduled_posts("user-1", chrono::Utc::now().timestamp())
            .await
            .unwrap();
        assert!(due.is_empty());
    }
}
