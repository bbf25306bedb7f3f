use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Entity ID of this service provider. Sent as the AuthnRequest issuer
    /// and required as the assertion audience.
    pub issuer: String,
    /// Entity ID the identity provider signs its assertions as.
    pub idp_entity_id: String,
    pub callback_url: String,
    pub entry_point: String,
    pub logout_url: Option<String>,
    pub sp_key_path: PathBuf,
    pub sp_cert_path: Option<PathBuf>,
    pub idp_cert_path: PathBuf,
    pub sign_requests: bool,
    pub validation_timeout: Duration,
    pub request_ttl: Duration,
    pub session_secret: String,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env(environment: String) -> Result<Self> {
        Self::from_lookup(environment, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        environment: String,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let required = |name: &str| lookup(name).with_context(|| format!("{name} must be set"));
        let optional = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid u16")?;

        let sign_requests = match optional("SAML_SIGN_REQUESTS").as_deref() {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => bail!("SAML_SIGN_REQUESTS must be true or false, got {other:?}"),
        };

        let config = Self {
            environment,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            issuer: required("SAML_ISSUER")?,
            idp_entity_id: required("SAML_IDP_ENTITY_ID")?,
            callback_url: required("SAML_CALLBACK_URL")?,
            entry_point: required("SAML_ENTRY_POINT")?,
            logout_url: optional("SAML_LOGOUT_URL"),
            sp_key_path: required("SAML_SP_KEY_PATH")?.into(),
            sp_cert_path: optional("SAML_SP_CERT_PATH").map(PathBuf::from),
            idp_cert_path: required("SAML_IDP_CERT_PATH")?.into(),
            sign_requests,
            validation_timeout: seconds(&lookup, "SAML_VALIDATION_TIMEOUT_SECS", 10)?,
            request_ttl: seconds(&lookup, "SAML_REQUEST_TTL_SECS", 5 * 60)?,
            session_secret: required("SESSION_SECRET")?,
            session_ttl: seconds(&lookup, "SESSION_TTL_SECS", 60 * 60)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the server must not start with.
    pub fn validate(&self) -> Result<()> {
        absolute_url("SAML_CALLBACK_URL", &self.callback_url)?;
        absolute_url("SAML_ENTRY_POINT", &self.entry_point)?;
        if let Some(logout_url) = &self.logout_url {
            absolute_url("SAML_LOGOUT_URL", logout_url)?;
        }
        if self.issuer.trim().is_empty() {
            bail!("SAML_ISSUER must not be empty");
        }
        if self.idp_entity_id.trim().is_empty() {
            bail!("SAML_IDP_ENTITY_ID must not be empty");
        }
        if self.session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
        }
        for (name, value) in [
            ("SAML_VALIDATION_TIMEOUT_SECS", self.validation_timeout),
            ("SAML_REQUEST_TTL_SECS", self.request_ttl),
            ("SESSION_TTL_SECS", self.session_ttl),
        ] {
            if value.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    /// Session cookies only get the `Secure` flag when the IdP posts back
    /// over https.
    pub fn secure_cookies(&self) -> bool {
        self.callback_url.starts_with("https://")
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<Duration> {
    let secs = match lookup(name) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{name} must be a whole number of seconds"))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn absolute_url(name: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).with_context(|| format!("{name} must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        bail!("{name} must be an http(s) URL with a host");
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("SAML_ISSUER", "https://sp.example.com".to_string()),
            ("SAML_IDP_ENTITY_ID", "https://idp.example.com".to_string()),
            (
                "SAML_CALLBACK_URL",
                "https://sp.example.com/login/callback".to_string(),
            ),
            ("SAML_ENTRY_POINT", "https://idp.example.com/sso".to_string()),
            ("SAML_SP_KEY_PATH", "certs/sp-key.pem".to_string()),
            ("SAML_IDP_CERT_PATH", "certs/idp-cert.pem".to_string()),
            ("SESSION_SECRET", "0123456789abcdef0123456789abcdef".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config> {
        Config::from_lookup("test".into(), |name| vars.get(name).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.sign_requests);
        assert_eq!(config.logout_url, None);
        assert_eq!(config.sp_cert_path, None);
        assert_eq!(config.validation_timeout, Duration::from_secs(10));
        assert_eq!(config.request_ttl, Duration::from_secs(300));
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert!(config.secure_cookies());
    }

    #[test]
    fn reads_overrides() {
        let mut vars = base_vars();
        vars.insert("PORT", "8080".into());
        vars.insert("SAML_SIGN_REQUESTS", "false".into());
        vars.insert("SAML_LOGOUT_URL", "https://idp.example.com/slo".into());
        vars.insert("SESSION_TTL_SECS", "60".into());
        vars.insert(
            "SAML_CALLBACK_URL",
            "http://localhost:3000/login/callback".into(),
        );

        let config = load(&vars).unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.sign_requests);
        assert_eq!(
            config.logout_url.as_deref(),
            Some("https://idp.example.com/slo")
        );
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert!(!config.secure_cookies());
    }

    #[test]
    fn missing_required_variable_is_named() {
        let mut vars = base_vars();
        vars.remove("SAML_ENTRY_POINT");
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("SAML_ENTRY_POINT"));
    }

    #[test]
    fn rejects_relative_urls() {
        let mut vars = base_vars();
        vars.insert("SAML_CALLBACK_URL", "/login/callback".into());
        assert!(load(&vars).is_err());

        let mut vars = base_vars();
        vars.insert("SAML_ENTRY_POINT", "ftp://idp.example.com/sso".into());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn rejects_short_session_secret() {
        let mut vars = base_vars();
        vars.insert("SESSION_SECRET", "keyboard cat".into());
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));
    }

    #[test]
    fn rejects_bad_numbers() {
        let mut vars = base_vars();
        vars.insert("PORT", "70000".into());
        assert!(load(&vars).is_err());

        let mut vars = base_vars();
        vars.insert("SAML_REQUEST_TTL_SECS", "0".into());
        assert!(load(&vars).is_err());

        let mut vars = base_vars();
        vars.insert("SAML_SIGN_REQUESTS", "maybe".into());
        assert!(load(&vars).is_err());
    }
}
