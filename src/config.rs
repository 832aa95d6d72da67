use std::env;

#[derive(Debug, Clone)]
pub struct PakasirConfig {
    pub base_url: String,
    pub project_slug: String,
    pub api_key: String,
}

impl PakasirConfig {
    /// Gateway calls are refused until both the project slug and api key are present.
    pub fn is_configured(&self) -> bool {
        !self.project_slug.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pakasir: PakasirConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let pakasir = PakasirConfig {
            base_url: env::var("PAKASIR_BASE_URL")
                .unwrap_or_else(|_| "https://pakasir.zone.id".to_string()),
            project_slug: env::var("PAKASIR_PROJECT_SLUG").unwrap_or_default(),
            api_key: env::var("PAKASIR_API_KEY").unwrap_or_default(),
        };
        Ok(Self {
            port,
            database_url,
            host,
            pakasir,
        })
    }
}
