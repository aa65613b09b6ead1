//! OAuth connection and token lifecycle
//!
//! Connecting an account is a chain: authorization code to short-lived
//! token, short-lived to long-lived, validate it, then resolve which
//! publishing destinations the token can reach. Each step failure keeps
//! the step name in the error so a user can tell where the chain broke.
//!
//! The long-lived user token lives on the credential row; each resolved
//! destination gets its own page access token, which is the only token
//! that ever publishes.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::db::Database;
use crate::error::{GraphError, PagecastError, Result};
use crate::graph::{BasicProfile, GraphClient, PageInfo, TokenHealth};
use crate::types::{ApiCredential, PlatformKind, SocialAccount};

/// OAuth dialog lives on the www host, not the Graph host
const AUTH_DIALOG_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";

const FACEBOOK_SCOPES: &str = "pages_show_list,pages_read_engagement,pages_manage_posts";
const INSTAGRAM_SCOPES: &str =
    "pages_show_list,pages_read_engagement,instagram_basic,instagram_content_publish";

/// Where a connection attempt landed after account resolution
#[derive(Debug, Clone)]
pub struct ResolvedAccounts {
    pub username: String,
    pub instagram_id: Option<String>,
    pub facebook_page_id: Option<String>,
    pub facebook_page_name: Option<String>,
    /// Absent for a read-only connection (no page reachable)
    pub page_access_token: Option<String>,
}

impl ResolvedAccounts {
    pub fn is_publishable(&self) -> bool {
        self.page_access_token.is_some()
    }
}

/// Random state parameter bound to the user starting the flow
pub fn generate_state(user_id: &str) -> String {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("{}:{}", user_id, nonce)
}

/// The callback's state must carry the same user that started the flow
pub fn verify_state(state: &str, expected_user: &str) -> bool {
    match state.split_once(':') {
        Some((user, nonce)) => user == expected_user && !nonce.is_empty(),
        None => false,
    }
}

pub fn build_auth_url(
    app_id: &str,
    redirect_uri: &str,
    state: &str,
    platform: PlatformKind,
) -> String {
    let scopes = match platform {
        PlatformKind::Facebook => FACEBOOK_SCOPES,
        PlatformKind::Instagram => INSTAGRAM_SCOPES,
    };

    format!(
        "{}?client_id={}&redirect_uri={}&state={}&scope={}&response_type=code",
        AUTH_DIALOG_URL,
        urlencoding::encode(app_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(scopes)
    )
}

pub struct AuthManager {
    db: Database,
    client: GraphClient,
}

impl AuthManager {
    pub fn new(db: Database, client: GraphClient) -> Self {
        Self { db, client }
    }

    /// Run the full connection chain for an authorization code and store
    /// what it yields: the long-lived token on the credential, one social
    /// account row per resolved destination.
    #[instrument(skip(self, code))]
    pub async fn connect(
        &self,
        user_id: &str,
        platform: PlatformKind,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ResolvedAccounts> {
        let credential = self
            .db
            .get_api_credential(user_id, platform)
            .await?
            .ok_or_else(|| {
                PagecastError::NotFound(format!(
                    "No API credentials configured for {}",
                    platform
                ))
            })?;

        let short_lived = self
            .client
            .exchange_code_for_token(
                code,
                &credential.app_id,
                &credential.app_secret,
                redirect_uri,
            )
            .await
            .map_err(|e| step_error("code exchange", e))?;

        let long_lived = self
            .client
            .exchange_for_long_lived_token(&short_lived, &credential.app_id, &credential.app_secret)
            .await
            .map_err(|e| step_error("long-lived exchange", e))?;

        // App token introspection; an invalid token stops the chain here
        let app_token = format!("{}|{}", credential.app_id, credential.app_secret);
        let health = self.client.debug_token(&long_lived, &app_token).await;
        if !health.is_valid {
            return Err(GraphError::Validation(format!(
                "token validation: {}",
                health.error.unwrap_or_else(|| "token is not valid".to_string())
            ))
            .into());
        }

        let pages = self
            .client
            .list_pages(&long_lived)
            .await
            .map_err(|e| step_error("page listing", e))?;

        let resolved = match resolve_accounts(&pages) {
            Some(resolved) => resolved,
            None => {
                // No page with a linked business account: fall back to
                // the bare profile and record a read-only connection
                let profile = self
                    .client
                    .basic_profile(&long_lived)
                    .await
                    .map_err(|e| step_error("profile lookup", e))?;
                warn!(user_id, "No business account reachable; connection is read-only");
                read_only_fallback(&profile)
            }
        };

        self.store_connection(user_id, platform, &credential, &long_lived, &resolved)
            .await?;

        info!(
            user_id,
            username = %resolved.username,
            publishable = resolved.is_publishable(),
            "Account connected"
        );
        Ok(resolved)
    }

    async fn store_connection(
        &self,
        user_id: &str,
        platform: PlatformKind,
        credential: &ApiCredential,
        long_lived: &str,
        resolved: &ResolvedAccounts,
    ) -> Result<()> {
        let mut updated = credential.clone();
        updated.long_lived_token = Some(long_lived.to_string());
        self.db.upsert_api_credential(&updated).await?;

        if let Some(page_id) = &resolved.facebook_page_id {
            let display_name = resolved
                .facebook_page_name
                .clone()
                .unwrap_or_else(|| resolved.username.clone());
            let account = SocialAccount::new(
                user_id.to_string(),
                PlatformKind::Facebook,
                page_id.clone(),
                display_name,
                resolved.page_access_token.clone(),
            );
            self.db.create_social_account(&account).await?;
        }

        if platform == PlatformKind::Instagram {
            if let Some(ig_id) = &resolved.instagram_id {
                let account = SocialAccount::new(
                    user_id.to_string(),
                    PlatformKind::Instagram,
                    ig_id.clone(),
                    resolved.username.clone(),
                    resolved.page_access_token.clone(),
                );
                self.db.create_social_account(&account).await?;
            }
        }

        Ok(())
    }

    /// Introspect the stored long-lived token for a platform
    pub async fn check_token_health(
        &self,
        user_id: &str,
        platform: PlatformKind,
    ) -> Result<TokenHealth> {
        let credential = self
            .db
            .get_api_credential(user_id, platform)
            .await?
            .ok_or_else(|| {
                PagecastError::NotFound(format!(
                    "No API credentials configured for {}",
                    platform
                ))
            })?;

        let token = match &credential.long_lived_token {
            Some(token) => token.clone(),
            None => {
                return Ok(TokenHealth {
                    is_valid: false,
                    error: Some("No long-lived token stored".to_string()),
                })
            }
        };

        let app_token = format!("{}|{}", credential.app_id, credential.app_secret);
        Ok(self.client.debug_token(&token, &app_token).await)
    }

    /// Re-list pages with the stored long-lived token and refresh every
    /// stored account's page token. Accounts whose page is no longer
    /// reachable lose their token and become read-only.
    #[instrument(skip(self))]
    pub async fn refresh_account_tokens(
        &self,
        user_id: &str,
        platform: PlatformKind,
    ) -> Result<usize> {
        let credential = self
            .db
            .get_api_credential(user_id, platform)
            .await?
            .ok_or_else(|| {
                PagecastError::NotFound(format!(
                    "No API credentials configured for {}",
                    platform
                ))
            })?;

        let token = credential.long_lived_token.as_deref().ok_or_else(|| {
            PagecastError::NotFound("No long-lived token stored".to_string())
        })?;

        let pages = self
            .client
            .list_pages(token)
            .await
            .map_err(|e| step_error("page listing", e))?;

        let accounts = self.db.list_social_accounts(user_id).await?;
        let mut refreshed = 0;

        for account in accounts.iter().filter(|a| a.platform == platform) {
            let fresh = match platform {
                PlatformKind::Facebook => pages
                    .iter()
                    .find(|p| p.id == account.account_id)
                    .and_then(|p| p.access_token.clone()),
                PlatformKind::Instagram => pages
                    .iter()
                    .find(|p| p.instagram_business_account.as_deref() == Some(&account.account_id))
                    .and_then(|p| p.access_token.clone()),
            };

            if fresh.is_none() {
                warn!(
                    account_id = %account.account_id,
                    "Page no longer reachable; account is now read-only"
                );
            }
            self.db
                .update_account_token(user_id, &account.id, fresh.as_deref())
                .await?;
            refreshed += 1;
        }

        Ok(refreshed)
    }
}

/// Pick the destination for a fresh connection: the first page with a
/// linked business account wins. Without one there is nothing to publish
/// to, and the caller records a read-only connection instead.
fn resolve_accounts(pages: &[PageInfo]) -> Option<ResolvedAccounts> {
    let page = pages
        .iter()
        .find(|p| p.instagram_business_account.is_some())?;

    Some(ResolvedAccounts {
        username: page.name.clone(),
        instagram_id: page.instagram_business_account.clone(),
        facebook_page_id: Some(page.id.clone()),
        facebook_page_name: Some(page.name.clone()),
        page_access_token: page.access_token.clone(),
    })
}

fn read_only_fallback(profile: &BasicProfile) -> ResolvedAccounts {
    ResolvedAccounts {
        username: profile.name.clone(),
        instagram_id: None,
        facebook_page_id: Some(profile.id.clone()),
        facebook_page_name: Some(profile.name.clone()),
        page_access_token: None,
    }
}

fn step_error(step: &str, err: GraphError) -> PagecastError {
    GraphError::api(format!("{}: {}", step, err)).into()
}
