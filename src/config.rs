use crate::features::ScoreScale;

/// Longest accepted prediction cache TTL (one year).
pub const MAX_PREDICTION_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub model_path: String,
    pub dataset_path: String,
    /// Training-time payment score scale, if the operator states it.
    pub payment_score_scale: Option<ScoreScale>,
    /// Start without a model and answer prediction requests with 503.
    pub allow_missing_model: bool,
    pub prediction_cache_ttl_secs: u64,
    pub prediction_cache_capacity: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            model_path: "models/loan_gbdt.json".to_string(),
            dataset_path: "Loan_Data_Cleaned.csv".to_string(),
            payment_score_scale: None,
            allow_missing_model: false,
            prediction_cache_ttl_secs: 300,
            prediction_cache_capacity: 10_000,
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
        }
    }
}

/// Reads an optional variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T, expected: &str) -> anyhow::Result<T> {
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be {}", name, expected)),
        None => Ok(default),
    }
}

fn check_cache_ttl(secs: u64) -> anyhow::Result<u64> {
    if secs > MAX_PREDICTION_CACHE_TTL_SECS {
        anyhow::bail!(
            "PREDICTION_CACHE_TTL_SECS must be at most {}",
            MAX_PREDICTION_CACHE_TTL_SECS
        );
    }
    Ok(secs)
}

fn parse_bool(name: &str, default: bool) -> anyhow::Result<bool> {
    match optional_var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => anyhow::bail!("{} must be true or false", name),
        },
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: parse_var("PORT", defaults.port, "a valid number between 1-65535")
                .and_then(|port| {
                    if port == 0 {
                        anyhow::bail!("PORT must be a valid number between 1-65535");
                    }
                    Ok(port)
                })?,
            model_path: optional_var("MODEL_PATH").unwrap_or(defaults.model_path),
            dataset_path: optional_var("DATASET_PATH").unwrap_or(defaults.dataset_path),
            payment_score_scale: optional_var("PAYMENT_SCORE_SCALE")
                .map(|raw| raw.parse::<ScoreScale>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("PAYMENT_SCORE_SCALE: {}", e))?,
            allow_missing_model: parse_bool("ALLOW_MISSING_MODEL", defaults.allow_missing_model)?,
            prediction_cache_ttl_secs: parse_var(
                "PREDICTION_CACHE_TTL_SECS",
                defaults.prediction_cache_ttl_secs,
                "a number of seconds",
            )
            .and_then(check_cache_ttl)?,
            prediction_cache_capacity: parse_var(
                "PREDICTION_CACHE_CAPACITY",
                defaults.prediction_cache_capacity,
                "a positive number",
            )?,
            rate_limit_per_second: parse_var(
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
                "a positive number",
            )
            .and_then(|n| {
                if n == 0 {
                    anyhow::bail!("RATE_LIMIT_PER_SECOND must be at least 1");
                }
                Ok(n)
            })?,
            rate_limit_burst: parse_var(
                "RATE_LIMIT_BURST",
                defaults.rate_limit_burst,
                "a positive number",
            )
            .and_then(|n| {
                if n == 0 {
                    anyhow::bail!("RATE_LIMIT_BURST must be at least 1");
                }
                Ok(n)
            })?,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Model path: {}", config.model_path);
        tracing::debug!("Dataset path: {}", config.dataset_path);
        if let Some(scale) = config.payment_score_scale {
            tracing::info!("Payment score scale configured: {}", scale.as_str());
        }
        tracing::debug!(
            "Prediction cache: {}s TTL, {} entries",
            config.prediction_cache_ttl_secs,
            config.prediction_cache_capacity
        );
        tracing::debug!(
            "Rate limit: {}/s, burst {}",
            config.rate_limit_per_second,
            config.rate_limit_burst
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Settles the payment score scale between the model artifact and the
    /// configuration.
    ///
    /// The artifact is authoritative. A configured scale that contradicts it
    /// is a start-up error, and so is a scale neither of them declares.
    pub fn resolve_score_scale(
        &self,
        from_model: Option<ScoreScale>,
    ) -> anyhow::Result<ScoreScale> {
        match (from_model, self.payment_score_scale) {
            (Some(model), Some(configured)) if model != configured => anyhow::bail!(
                "PAYMENT_SCORE_SCALE is '{}' but the model was trained with '{}'",
                configured.as_str(),
                model.as_str()
            ),
            (Some(model), _) => Ok(model),
            (None, Some(configured)) => Ok(configured),
            (None, None) => anyhow::bail!(
                "The model does not declare a payment score scale; set PAYMENT_SCORE_SCALE to 'fraction' or 'percent'"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_scale_wins() {
        let config = Config::default();
        assert_eq!(
            config
                .resolve_score_scale(Some(ScoreScale::Percent))
                .unwrap(),
            ScoreScale::Percent
        );
    }

    #[test]
    fn test_conflicting_scales_fail() {
        let config = Config {
            payment_score_scale: Some(ScoreScale::Fraction),
            ..Config::default()
        };
        assert!(config
            .resolve_score_scale(Some(ScoreScale::Percent))
            .is_err());
        assert!(config
            .resolve_score_scale(Some(ScoreScale::Fraction))
            .is_ok());
    }

    #[test]
    fn test_configured_scale_used_without_model_declaration() {
        let config = Config {
            payment_score_scale: Some(ScoreScale::Percent),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_score_scale(None).unwrap(),
            ScoreScale::Percent
        );
    }

    #[test]
    fn test_undeclared_scale_is_refused() {
        let err = Config::default().resolve_score_scale(None).unwrap_err();
        assert!(err.to_string().contains("PAYMENT_SCORE_SCALE"));
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        assert_eq!(check_cache_ttl(300).unwrap(), 300);
        assert_eq!(
            check_cache_ttl(MAX_PREDICTION_CACHE_TTL_SECS).unwrap(),
            MAX_PREDICTION_CACHE_TTL_SECS
        );
        let err = check_cache_ttl(99_999_999_999).unwrap_err();
        assert!(err.to_string().contains("PREDICTION_CACHE_TTL_SECS must be at most"));
    }

    #[test]
    fn test_from_env_rejects_oversized_cache_ttl() {
        std::env::set_var("PREDICTION_CACHE_TTL_SECS", "99999999999");
        let result = Config::from_env();
        std::env::remove_var("PREDICTION_CACHE_TTL_SECS");
        assert!(result.is_err());
    }
}
