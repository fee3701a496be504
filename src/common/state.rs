// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;

/// Application state containing the database pool and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    /// Expected audience for Google ID tokens. When unset, audience
    /// validation is skipped (development only).
    pub google_client_id: Option<String>,
}
