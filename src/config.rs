use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub toss_secret_key: String,
    pub toss_api_base: String,
    pub upload_dir: String,
    /// Deliveries are only accepted to addresses containing this district.
    pub service_area: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .unwrap_or(24);
        let toss_secret_key = env::var("TOSS_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("TOSS_SECRET_KEY is not set"))?;
        let toss_api_base = env::var("TOSS_API_BASE")
            .unwrap_or_else(|_| "https://api.tosspayments.com".to_string());
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let service_area = env::var("SERVICE_AREA").unwrap_or_else(|_| "송도동".to_string());
        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            toss_secret_key,
            toss_api_base,
            upload_dir,
            service_area,
        })
    }
}
