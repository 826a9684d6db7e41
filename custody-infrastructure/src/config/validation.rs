use anyhow::{anyhow, Result};

pub fn validate_http_url(key: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{} is empty", key));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!("{} must start with http:// or https://", key));
    }
    Ok(())
}

pub fn validate_database_url(value: &str) -> Result<()> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://")) {
        return Err(anyhow!("database_url must be a postgres:// connection string"));
    }
    Ok(())
}

pub fn validate_positive(key: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(anyhow!("{} must be greater than 0", key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_urls_need_a_scheme() {
        assert!(validate_http_url("identity_url", "https://id.example.com").is_ok());
        assert!(validate_http_url("identity_url", "id.example.com").is_err());
        assert!(validate_http_url("identity_url", "  ").is_err());
    }

    #[test]
    fn database_url_must_be_postgres() {
        assert!(validate_database_url("postgres://custody@localhost/custody").is_ok());
        assert!(validate_database_url("mysql://localhost/custody").is_err());
    }
}
