// src/config.rs

use dotenvy::dotenv;
use std::env;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Base URL the frontend is served from; published quizzes get a
    /// share link under it.
    pub public_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        Url::parse(&public_base_url).expect("PUBLIC_BASE_URL must be a valid URL");

        // An empty value (common in copied .env templates) counts as unset.
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty());
        let gemini_base_url = env::var("GEMINI_BASE_URL").ok().filter(|v| !v.is_empty());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            public_base_url,
            gemini_api_key,
            gemini_base_url,
        }
    }
}
