use anyhow::Result;

const DEFAULT_FCM_API_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// Server configuration, read once at startup. Dispatcher credentials live
/// here so the dispatcher can be constructed and injected explicitly rather
/// than probed from ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub fcm_server_key: Option<String>,
    pub fcm_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("BEACON_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("BEACON_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;
        let db_path = std::env::var("BEACON_DB_PATH").unwrap_or_else(|_| "beacon.db".into());
        let jwt_secret =
            std::env::var("BEACON_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        let fcm_server_key = std::env::var("FCM_SERVER_KEY").ok().filter(|k| !k.is_empty());
        let fcm_api_url =
            std::env::var("FCM_API_URL").unwrap_or_else(|_| DEFAULT_FCM_API_URL.into());

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            fcm_server_key,
            fcm_api_url,
        })
    }
}
