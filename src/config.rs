use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub api_token: String,
    pub chat_service_url: String,
    pub ratings_service_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "gigbook.db".to_string()),
            api_token: env::var("API_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            chat_service_url: env::var("CHAT_SERVICE_URL").unwrap_or_default(),
            ratings_service_url: env::var("RATINGS_SERVICE_URL").unwrap_or_default(),
        }
    }
}
