//! Bootstrap: startup checks and upstream wiring.
//!
//! When itineraryd starts:
//! 1. Verify both upstream credentials are configured. If not, refuse to start.
//! 2. Build one token source per upstream endpoint and the gateway over them.

use std::sync::Arc;

use itinerary_upstream::{PasswordLogin, StaticToken, TokenSource, UpstreamGateway};
use tracing::info;

use crate::config::{LoginSection, ServerConfig, UpstreamSection};

/// Verify the configuration can serve requests.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    let upstream = &config.upstream;
    if upstream.base_url.trim().is_empty() {
        anyhow::bail!("Upstream base_url is empty in configuration.");
    }
    if !has_credential(&upstream.sales_orders_token, upstream) {
        anyhow::bail!(
            "Missing SALES_ORDERS_AUTH_TOKEN.\n\
             Set it in the environment, or configure [upstream] sales_orders_token or [upstream.login]."
        );
    }
    if !has_credential(&upstream.transaction_token, upstream) {
        anyhow::bail!(
            "Missing TRANSACTION_AUTH_TOKEN.\n\
             Set it in the environment, or configure [upstream] transaction_token or [upstream.login]."
        );
    }
    if config.server.listen.trim().is_empty() {
        anyhow::bail!("Server listen address is empty in configuration.");
    }
    Ok(())
}

fn has_credential(token: &Option<String>, upstream: &UpstreamSection) -> bool {
    token.as_deref().is_some_and(|t| !t.trim().is_empty()) || upstream.login.is_some()
}

/// Build the gateway. A static token wins over the login section; both
/// endpoints share one login session.
pub fn build_gateway(upstream: &UpstreamSection) -> UpstreamGateway {
    let base_url = upstream.base_url.trim_end_matches('/');
    let login: Option<Arc<dyn TokenSource>> = upstream
        .login
        .as_ref()
        .map(|l| Arc::new(password_login(base_url, l)) as Arc<dyn TokenSource>);

    let sales_orders_auth = credential("sales orders", &upstream.sales_orders_token, &login);
    let transaction_auth = credential("transaction", &upstream.transaction_token, &login);

    UpstreamGateway::new(base_url, sales_orders_auth, transaction_auth)
        .with_paths(&upstream.sales_orders_path, &upstream.transaction_path)
}

fn password_login(base_url: &str, login: &LoginSection) -> PasswordLogin {
    let path = if login.path.starts_with('/') {
        login.path.clone()
    } else {
        format!("/{}", login.path)
    };
    PasswordLogin::new(format!("{}{}", base_url, path), &login.username, &login.password)
}

fn credential(
    endpoint: &str,
    token: &Option<String>,
    login: &Option<Arc<dyn TokenSource>>,
) -> Arc<dyn TokenSource> {
    match (token.as_deref().filter(|t| !t.trim().is_empty()), login) {
        (Some(token), _) => {
            info!("{} endpoint uses a static token", endpoint);
            Arc::new(StaticToken::new(token))
        }
        (None, Some(login)) => {
            info!("{} endpoint uses password login", endpoint);
            Arc::clone(login)
        }
        // Unreachable after verify_config.
        (None, None) => Arc::new(itinerary_upstream::NoAuth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_tokens(so: Option<&str>, trx: Option<&str>) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.upstream.sales_orders_token = so.map(Into::into);
        config.upstream.transaction_token = trx.map(Into::into);
        config
    }

    #[test]
    fn test_verify_config_both_tokens() {
        assert!(verify_config(&with_tokens(Some("a"), Some("b"))).is_ok());
    }

    #[test]
    fn test_verify_config_missing_sales_orders_token() {
        let err = verify_config(&with_tokens(None, Some("b"))).unwrap_err();
        assert!(err.to_string().contains("SALES_ORDERS_AUTH_TOKEN"));
    }

    #[test]
    fn test_verify_config_missing_transaction_token() {
        let err = verify_config(&with_tokens(Some("a"), Some("  "))).unwrap_err();
        assert!(err.to_string().contains("TRANSACTION_AUTH_TOKEN"));
    }

    #[test]
    fn test_verify_config_login_covers_both() {
        let mut config = with_tokens(None, None);
        config.upstream.login = Some(LoginSection {
            path: "/api/login".into(),
            username: "u".into(),
            password: "p".into(),
        });
        assert!(verify_config(&config).is_ok());
    }

    #[test]
    fn test_verify_config_empty_base_url() {
        let mut config = with_tokens(Some("a"), Some("b"));
        config.upstream.base_url = String::new();
        assert!(verify_config(&config).is_err());
    }

    #[test]
    fn test_build_gateway_trims_base_url() {
        let mut config = with_tokens(Some("a"), Some("b"));
        config.upstream.base_url = "http://erp.local/".into();
        let gw = build_gateway(&config.upstream);
        assert_eq!(gw.base_url(), "http://erp.local");
    }
}
