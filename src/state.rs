use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::AppConfig, payments::TossClient};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub payments: TossClient,
}

impl AppState {
    pub fn new(orm: DatabaseConnection, config: AppConfig) -> Self {
        let payments = TossClient::new(&config.toss_api_base, &config.toss_secret_key);
        Self {
            orm,
            config: Arc::new(config),
            payments,
        }
    }
}
