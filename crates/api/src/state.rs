//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use scalazap_billing::ReconciliationEngine;
use scalazap_provisioning::{
    IdentityAdminClient, MemberDirectory, PgMemberDirectory, ProvisioningSaga,
};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Webhook event store, reconciler and gap recorder over one pool.
    pub engine: ReconciliationEngine,
    pub members: Arc<dyn MemberDirectory>,
    /// Member provisioning (None when the identity provider is not configured;
    /// the member endpoints answer 503 in that case).
    pub provisioning: Option<Arc<ProvisioningSaga>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let engine = ReconciliationEngine::new(pool.clone());
        let members: Arc<dyn MemberDirectory> = Arc::new(PgMemberDirectory::new(pool.clone()));

        let provisioning = match (
            config.identity_provider_url.as_deref(),
            config.identity_service_key.as_deref(),
        ) {
            (Some(url), Some(key)) => {
                tracing::info!(identity_provider = %url, "Member provisioning enabled");
                let identity = Arc::new(IdentityAdminClient::new(url, key));
                Some(Arc::new(ProvisioningSaga::new(identity, members.clone())))
            }
            _ => {
                tracing::warn!(
                    "Member provisioning disabled (missing IDENTITY_PROVIDER_URL or IDENTITY_SERVICE_KEY)"
                );
                None
            }
        };

        if config.webhook_token.is_none() {
            tracing::warn!("WEBHOOK_TOKEN not set; inbound webhooks are accepted unverified");
        }
        if config.admin_api_token.is_none() {
            tracing::warn!("ADMIN_API_TOKEN not set; the admin surface is closed");
        }

        Self {
            pool,
            config,
            engine,
            members,
            provisioning,
        }
    }
}
