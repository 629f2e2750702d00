//! Server configuration: `config.toml` plus environment overrides.
//!
//! Every field has a default, so running without a file is valid as long
//! as the upstream credentials come from the environment.

use std::path::Path;

use serde::Deserialize;

use itinerary::print::Branding;
use itinerary::sheets::PickerDefaults;

pub const DEFAULT_UPSTREAM: &str = "http://gsuite.graphicstar.com.ph";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub upstream: UpstreamSection,
    pub picker: PickerDefaults,
    pub print: Branding,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen: String,
    /// Directory of static files served after the API routes.
    pub public_dir: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            public_dir: "public".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    pub base_url: String,
    pub sales_orders_path: String,
    pub transaction_path: String,
    /// Sent verbatim as `Authorization` on sales-order requests.
    pub sales_orders_token: Option<String>,
    /// Sent verbatim as `Authorization` on transaction requests.
    pub transaction_token: Option<String>,
    /// Password login, used for any endpoint without a static token.
    pub login: Option<LoginSection>,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM.to_string(),
            sales_orders_path: itinerary_upstream::gateway::SALES_ORDERS_PATH.to_string(),
            transaction_path: itinerary_upstream::gateway::TRANSACTION_PATH.to_string(),
            sales_orders_token: None,
            transaction_token: None,
            login: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginSection {
    #[serde(default = "default_login_path")]
    pub path: String,
    pub username: String,
    pub password: String,
}

fn default_login_path() -> String {
    "/api/login".to_string()
}

impl ServerConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Apply `PORT`, `UPSTREAM_BASE_URL`, `SALES_ORDERS_AUTH_TOKEN` and
    /// `TRANSACTION_AUTH_TOKEN`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            let host = self
                .server
                .listen
                .rsplit_once(':')
                .map_or("0.0.0.0", |(host, _)| host)
                .to_string();
            self.server.listen = format!("{}:{}", host, port.trim());
        }
        if let Some(url) = get("UPSTREAM_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(token) = get("SALES_ORDERS_AUTH_TOKEN") {
            self.upstream.sales_orders_token = Some(token);
        }
        if let Some(token) = get("TRANSACTION_AUTH_TOKEN") {
            self.upstream.transaction_token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:3000");
        assert_eq!(config.upstream.base_url, DEFAULT_UPSTREAM);
        assert_eq!(config.upstream.sales_orders_path, "/api/get_sales_orders");
        assert_eq!(config.picker.limit, 1000);
        assert_eq!(config.print.logo_url, "logo.jpg");
        assert!(config.upstream.login.is_none());
    }

    #[test]
    fn load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
listen = "127.0.0.1:9000"

[upstream]
base_url = "http://erp.local"
transaction_token = "trx"

[upstream.login]
username = "dispatch"
password = "secret"

[picker]
from_date = "2024-01-01"
location_pk = "loc-1"

[print]
company_name = "Cebu Graphicstar Imaging Corp."
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.public_dir, "public");
        assert_eq!(config.upstream.base_url, "http://erp.local");
        assert_eq!(config.upstream.transaction_token.as_deref(), Some("trx"));
        let login = config.upstream.login.unwrap();
        assert_eq!(login.path, "/api/login");
        assert_eq!(login.username, "dispatch");
        assert_eq!(config.picker.from_date, "2024-01-01");
        assert_eq!(config.picker.location_pk.as_deref(), Some("loc-1"));
        assert_eq!(config.picker.limit, 1000);
        assert_eq!(config.print.company_name, "Cebu Graphicstar Imaging Corp.");
        assert_eq!(config.print.logo_url, "logo.jpg");
    }

    #[test]
    fn load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server\nlisten = 1").unwrap();
        assert!(ServerConfig::load(file.path()).is_err());
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8081"),
            ("SALES_ORDERS_AUTH_TOKEN", "so-token"),
            ("TRANSACTION_AUTH_TOKEN", ""),
            ("UPSTREAM_BASE_URL", "http://10.0.0.5"),
        ]);
        let mut config = ServerConfig::default();
        config.upstream.transaction_token = Some("from-file".into());
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.listen, "0.0.0.0:8081");
        assert_eq!(config.upstream.base_url, "http://10.0.0.5");
        assert_eq!(config.upstream.sales_orders_token.as_deref(), Some("so-token"));
        assert_eq!(config.upstream.transaction_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn port_keeps_configured_host() {
        let mut config = ServerConfig::default();
        config.server.listen = "127.0.0.1:3000".into();
        config.apply_env(|k| (k == "PORT").then(|| "4000".to_string()));
        assert_eq!(config.server.listen, "127.0.0.1:4000");
    }
}
