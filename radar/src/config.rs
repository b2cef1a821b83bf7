use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub places_api_key: String,
    pub gemini_api_key: String,
    pub language_code: String,
    pub default_radius_km: f64,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub lead_from: String,
    pub lead_to: String,
    pub dashboard_port: u16,
}

impl Config {
    /// Load config from a specific .env file, or the default `.env` if None.
    pub fn from_env_file(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => { dotenvy::from_filename(p).ok(); }
            None => { dotenvy::dotenv().ok(); }
        }
        Self::build_from_env()
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::build_from_env()
    }

    fn build_from_env() -> Result<Self> {
        Ok(Self {
            places_api_key: env("PLACES_API_KEY", ""),
            gemini_api_key: env("GEMINI_API_KEY", ""),
            language_code: env("LANGUAGE_CODE", "en"),
            default_radius_km: env_f64("DEFAULT_RADIUS_KM", "2.5")?,
            smtp_host: env("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: env("SMTP_PORT", "587").parse().unwrap_or(587),
            smtp_user: env("SMTP_USER", ""),
            smtp_pass: env("SMTP_PASS", ""),
            lead_from: env("LEAD_FROM", ""),
            lead_to: env("LEAD_TO", ""),
            dashboard_port: env("DASHBOARD_PORT", "3000").parse().unwrap_or(3000),
        })
    }
}

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f64(key: &str, default: &str) -> Result<f64> {
    let val = env(key, default);
    val.parse::<f64>()
        .with_context(|| format!("Invalid number for {key}: {val}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        // the host environment may export these; clear them first
        for key in ["LANGUAGE_CODE", "SMTP_PORT", "DEFAULT_RADIUS_KM", "DASHBOARD_PORT"] {
            std::env::remove_var(key);
        }
        let cfg = Config::build_from_env().unwrap();
        assert_eq!(cfg.language_code, "en");
        assert_eq!(cfg.smtp_port, 587);
        assert_eq!(cfg.dashboard_port, 3000);
        assert!((cfg.default_radius_km - 2.5).abs() < f64::EPSILON);
    }
}
