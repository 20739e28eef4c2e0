use std::sync::Arc;

use sqlx::PgPool;

use crate::analysis::PitchAnalyzer;
use crate::auth::directory::AccountDirectory;
use crate::auth::JwtKeys;
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimits;
use crate::storage::AudioStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    /// Pluggable pitch scorer. Default: `LlmPitchAnalyzer` over `llm`.
    pub analyzer: Arc<dyn PitchAnalyzer>,
    pub storage: AudioStorage,
    pub jwt: JwtKeys,
    /// Current account roles. Default: `PgAccountDirectory` over `db`.
    pub accounts: Arc<dyn AccountDirectory>,
    /// Address registered as admin, from `ADMIN_EMAIL`.
    pub admin_email: Option<String>,
    pub limits: RateLimits,
}

#[cfg(test)]
use crate::auth::directory::MemoryDirectory;

#[cfg(test)]
impl AppState {
    /// State whose pool connects lazily to an unreachable database, for
    /// tests that never get past middleware or validation. Accounts live in
    /// the returned [`MemoryDirectory`].
    pub fn for_tests() -> (Self, Arc<MemoryDirectory>) {
        use crate::analysis::LlmPitchAnalyzer;
        use crate::config::Config;
        use sqlx::postgres::PgPoolOptions;

        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy(&config.database_url)
            .unwrap();
        let llm = LlmClient::new(
            config.gemini_api_key.clone(),
            config.gemini_api_base.clone(),
            config.gemini_model.clone(),
        )
        .unwrap();
        let accounts = Arc::new(MemoryDirectory::default());
        let state = AppState {
            db,
            analyzer: Arc::new(LlmPitchAnalyzer(llm.clone())),
            llm,
            storage: AudioStorage::for_tests(&config),
            jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            accounts: accounts.clone(),
            admin_email: config.admin_email.clone(),
            limits: RateLimits::new(config.rate_limit_per_minute, config.auth_rate_limit_per_minute),
        };
        (state, accounts)
    }
}
