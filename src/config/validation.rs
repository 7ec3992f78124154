use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crate::{ConfigError, ConfigResult};
use reqwest::header::HeaderValue;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the registry endpoints
fn validate_site_config(config: &SiteConfig) -> ConfigResult<()> {
    validate_http_url("start-url", &config.start_url)?;
    validate_http_url("postback-url", &config.postback_url)?;
    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> ConfigResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS",
            key, value
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if !(1..=64).contains(&config.max_concurrent_exhibits) {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-exhibits must be between 1 and 64, got {}",
            config.max_concurrent_exhibits
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "request-timeout must be at least 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
///
/// The assembled `Name/Version (+URL; email)` string is sent on every request,
/// so it must also be a legal header value.
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    let name_ok = !config.crawler_name.is_empty()
        && config
            .crawler_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !name_ok {
        return Err(ConfigError::Validation(format!(
            "crawler-name must be non-empty ASCII letters, digits, '-' or '_', got '{}'",
            config.crawler_name
        )));
    }

    validate_http_url("contact-url", &config.contact_url)?;
    validate_email(&config.contact_email)?;

    let agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );
    HeaderValue::from_str(&agent).map_err(|_| {
        ConfigError::Validation(format!("user agent '{}' is not a valid header value", agent))
    })?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.items_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "items-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks for a `local@domain.tld` shape
fn validate_email(email: &str) -> ConfigResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact-email '{}' is not an email address",
            email
        )))
    }
}
