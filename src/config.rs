use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LOG_FILE_NAME: &str = "amq-explorer.log";

/// Application configuration, persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionProfile>,
    #[serde(default)]
    pub settings: AppSettings,
}

/// A named broker connection. `name` is the unique key within the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub is_default: bool,
    /// Path of the Jolokia endpoint on the broker's web console.
    #[serde(default = "default_context_path")]
    pub context_path: String,
    /// `brokerName` key of the broker MBean.
    #[serde(default = "default_broker_name")]
    pub broker_name: String,
}

fn default_context_path() -> String {
    "/api/jolokia".to_string()
}

fn default_broker_name() -> String {
    "localhost".to_string()
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            name: "Local".to_string(),
            host: "localhost".to_string(),
            port: 8161,
            user: "admin".to_string(),
            password: "admin".to_string(),
            use_tls: false,
            is_default: false,
            context_path: default_context_path(),
            broker_name: default_broker_name(),
        }
    }
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("use_tls", &self.use_tls)
            .field("is_default", &self.is_default)
            .field("context_path", &self.context_path)
            .field("broker_name", &self.broker_name)
            .finish_non_exhaustive()
    }
}

impl ConnectionProfile {
    /// `host:port` with scheme, for titles and logs.
    pub fn address(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub request_timeout_secs: u64,
    /// Upper bound on concurrent broker calls during a batch move/delete.
    pub batch_concurrency: usize,
    pub auto_refresh_secs: u64,
    pub log_to_file: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
            batch_concurrency: 8,
            auto_refresh_secs: 0, // 0 = disabled
            log_to_file: true,
        }
    }
}

impl AppConfig {
    /// Standard config directory: ~/.config/amq-explorer
    pub fn config_dir() -> PathBuf {
        dirs_fallback().join("amq-explorer")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn log_path() -> PathBuf {
        Self::config_dir().join(LOG_FILE_NAME)
    }

    /// Load config from the standard location, seeding it on first run.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. A missing file yields the seeded default
    /// (one `Local` profile) which is written back; an unreadable file yields
    /// an empty store.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::seeded();
            if let Err(e) = config.save_to(path) {
                warn!("Could not write initial config to {}: {}", path.display(), e);
            }
            return config;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("Could not read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn seeded() -> Self {
        Self {
            connections: vec![ConnectionProfile {
                is_default: true,
                ..ConnectionProfile::default()
            }],
            settings: AppSettings::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // ────────── Connection profile store ──────────

    pub fn get(&self, name: &str) -> Option<&ConnectionProfile> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// The flagged default profile, else the first one, else none.
    pub fn default_connection(&self) -> Option<&ConnectionProfile> {
        self.connections
            .iter()
            .find(|c| c.is_default)
            .or_else(|| self.connections.first())
    }

    /// Add a profile, replacing any existing profile with the same name.
    pub fn add_connection(&mut self, profile: ConnectionProfile) {
        if profile.is_default {
            self.clear_default();
        }
        if let Some(existing) = self.connections.iter_mut().find(|c| c.name == profile.name) {
            *existing = profile;
        } else {
            self.connections.push(profile);
        }
    }

    /// Replace the profile stored under `old_name` (the name itself may change).
    /// Returns false when no such profile exists.
    pub fn update_connection(&mut self, old_name: &str, profile: ConnectionProfile) -> bool {
        let Some(idx) = self.connections.iter().position(|c| c.name == old_name) else {
            return false;
        };
        if profile.is_default {
            self.clear_default();
        }
        // A rename onto another profile's name replaces that profile.
        let new_name = profile.name.clone();
        self.connections[idx] = profile;
        let mut i = 0;
        self.connections.retain(|c| {
            let keep = i == idx || c.name != new_name;
            i += 1;
            keep
        });
        true
    }

    pub fn delete_connection(&mut self, name: &str) {
        self.connections.retain(|c| c.name != name);
    }

    pub fn set_default(&mut self, name: &str) -> bool {
        if self.get(name).is_none() {
            return false;
        }
        for c in &mut self.connections {
            c.is_default = c.name == name;
        }
        true
    }

    fn clear_default(&mut self) {
        for c in &mut self.connections {
            c.is_default = false;
        }
    }
}

/// Cross-platform config directory fallback.
fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, is_default: bool) -> ConnectionProfile {
        ConnectionProfile {
            name: name.to_string(),
            is_default,
            ..ConnectionProfile::default()
        }
    }

    fn defaults(config: &AppConfig) -> Vec<&str> {
        config
            .connections
            .iter()
            .filter(|c| c.is_default)
            .map(|c| c.name.as_str())
            .collect()
    }

    #[test]
    fn adding_a_default_clears_the_others() {
        let mut config = AppConfig::default();
        config.add_connection(profile("dev", true));
        config.add_connection(profile("prod", true));
        assert_eq!(defaults(&config), vec!["prod"]);
        assert_eq!(config.default_connection().unwrap().name, "prod");
    }

    #[test]
    fn add_with_existing_name_replaces() {
        let mut config = AppConfig::default();
        config.add_connection(profile("dev", false));
        let mut replacement = profile("dev", false);
        replacement.host = "mq.dev".into();
        config.add_connection(replacement);
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.connections[0].host, "mq.dev");
    }

    #[test]
    fn default_falls_back_to_first_profile() {
        let mut config = AppConfig::default();
        assert!(config.default_connection().is_none());
        config.add_connection(profile("a", false));
        config.add_connection(profile("b", false));
        assert_eq!(config.default_connection().unwrap().name, "a");
    }

    #[test]
    fn update_can_rename_and_take_default() {
        let mut config = AppConfig::default();
        config.add_connection(profile("a", true));
        config.add_connection(profile("b", false));
        assert!(config.update_connection("b", profile("b2", true)));
        assert_eq!(defaults(&config), vec!["b2"]);
        assert!(config.get("b").is_none());
        assert!(!config.update_connection("missing", profile("x", false)));
    }

    #[test]
    fn rename_onto_existing_name_keeps_one_entry() {
        let mut config = AppConfig::default();
        config.add_connection(profile("a", false));
        config.add_connection(profile("b", false));
        let mut renamed = profile("a", false);
        renamed.port = 9000;
        assert!(config.update_connection("b", renamed));
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.connections[0].port, 9000);
    }

    #[test]
    fn set_default_and_delete() {
        let mut config = AppConfig::default();
        config.add_connection(profile("a", true));
        config.add_connection(profile("b", false));
        assert!(config.set_default("b"));
        assert_eq!(defaults(&config), vec!["b"]);
        assert!(!config.set_default("zzz"));
        config.delete_connection("b");
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.default_connection().unwrap().name, "a");
    }

    #[test]
    fn first_load_seeds_local_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amq-explorer").join("config.toml");
        let config = AppConfig::load_from(&path);
        assert!(path.exists());
        let local = config.default_connection().unwrap();
        assert_eq!(local.name, "Local");
        assert_eq!(local.port, 8161);
        assert!(local.is_default);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        let mut p = profile("prod", true);
        p.use_tls = true;
        p.context_path = "/console/jolokia".into();
        config.add_connection(p.clone());
        config.settings.batch_concurrency = 3;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.connections, vec![p]);
        assert_eq!(loaded.settings.batch_concurrency, 3);
    }

    #[test]
    fn older_profiles_get_endpoint_defaults() {
        let toml_str = r#"
            [[connections]]
            name = "legacy"
            host = "mq"
            port = 8161
            user = "admin"
            password = "secret"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let p = &config.connections[0];
        assert_eq!(p.context_path, "/api/jolokia");
        assert_eq!(p.broker_name, "localhost");
        assert!(!p.use_tls);
        assert_eq!(config.settings.request_timeout_secs, 5);
    }

    #[test]
    fn debug_output_hides_password() {
        let mut p = profile("a", false);
        p.password = "hunter2".into();
        assert!(!format!("{:?}", p).contains("hunter2"));
    }
}
