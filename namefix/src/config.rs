use std::fmt;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Deserializer};
use serde::de::Error as _;
use anyhow::{bail, Context, Result};
use shared::protocol::PRINTER_SERVICE_TYPE;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub admin: AdminSurface,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_service_type")]
    pub service_type: String,
    /// Per-announcement resolution bound
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_ms: u64,
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

/// How to find an element on an admin page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Id(String),
    Css(String),
    Name(String),
}

impl Locator {
    pub fn id(value: &str) -> Self {
        Locator::Id(value.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
            Locator::Name(v) => write!(f, "name={}", v),
        }
    }
}

/// Where the name editor lives once logged in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SettingsAccess {
    /// Editor has its own URL, relative to the printer origin
    Direct { path: String },
    /// Editor is reached by clicking an "edit" control on the landing page
    EditButton { locator: Locator },
}

/// Admin web UI layout for one device family.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminSurface {
    pub scheme: String,
    pub login_path: String,
    /// Clicked before typing the PIN, e.g. a "system manager" mode toggle.
    /// `login_mode = false` turns it off for devices without one.
    #[serde(deserialize_with = "optional_locator")]
    pub login_mode: Option<Locator>,
    pub password_field: Locator,
    pub login_submit: Locator,
    /// Suffix of the URL the printer redirects to after a good login
    pub landing_suffix: String,
    pub settings: SettingsAccess,
    pub name_field: Locator,
    pub settings_submit: Locator,
    pub wait_timeout_secs: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorOrOff {
    Off(bool),
    Locator(Locator),
}

fn optional_locator<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Locator>, D::Error> {
    match LocatorOrOff::deserialize(deserializer)? {
        LocatorOrOff::Off(false) => Ok(None),
        LocatorOrOff::Off(true) => Err(D::Error::custom("expected a locator or false")),
        LocatorOrOff::Locator(locator) => Ok(Some(locator)),
    }
}

fn default_service_type() -> String {
    PRINTER_SERVICE_TYPE.to_string()
}

fn default_resolve_timeout() -> u64 {
    3000
}

fn default_bus_capacity() -> usize {
    256
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            resolve_timeout_ms: default_resolve_timeout(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl DiscoveryConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Default for AdminSurface {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            login_path: "login.html".to_string(),
            login_mode: Some(Locator::id("i0012A")),
            password_field: Locator::id("i2101"),
            login_submit: Locator::id("submitButton"),
            landing_suffix: "portal_top.html".to_string(),
            settings: SettingsAccess::Direct {
                path: "m_network_airprint_edit.html".to_string(),
            },
            name_field: Locator::id("i2072"),
            settings_submit: Locator::id("submitButton"),
            wait_timeout_secs: 20,
        }
    }
}

impl AdminSurface {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery.bus_capacity == 0 {
            bail!("discovery.bus_capacity must be at least 1");
        }
        if self.discovery.resolve_timeout_ms == 0 {
            bail!("discovery.resolve_timeout_ms must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.discovery.service_type, PRINTER_SERVICE_TYPE);
        assert_eq!(config.discovery.resolve_timeout(), Duration::from_secs(3));
        assert_eq!(config.admin.password_field, Locator::id("i2101"));
        assert_eq!(config.admin.wait_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_parse_custom_surface() {
        let config: Config = toml::from_str(
            r#"
            [discovery]
            resolve_timeout_ms = 500

            [admin]
            scheme = "http"
            login_path = "/"
            password_field = { by = "name", value = "pin" }
            landing_suffix = "/home"
            settings = { mode = "edit_button", locator = { by = "css", value = "a.edit" } }
            name_field = { by = "css", value = "input#bonjour" }
            "#,
        )
        .unwrap();

        assert_eq!(config.discovery.resolve_timeout_ms, 500);
        assert_eq!(config.discovery.bus_capacity, 256);
        assert_eq!(config.admin.scheme, "http");
        assert_eq!(config.admin.password_field, Locator::Name("pin".to_string()));
        assert_eq!(
            config.admin.settings,
            SettingsAccess::EditButton { locator: Locator::Css("a.edit".to_string()) }
        );
        // Untouched fields keep their defaults
        assert_eq!(config.admin.login_submit, Locator::id("submitButton"));
        assert_eq!(config.admin.login_mode, Some(Locator::id("i0012A")));
    }

    #[test]
    fn test_login_mode_can_be_turned_off() {
        let config: Config = toml::from_str(
            r#"
            [admin]
            login_mode = false
            "#,
        )
        .unwrap();
        assert_eq!(config.admin.login_mode, None);

        let config: Config = toml::from_str(
            r#"
            [admin]
            login_mode = { by = "css", value = "a.admin" }
            "#,
        )
        .unwrap();
        assert_eq!(config.admin.login_mode, Some(Locator::Css("a.admin".to_string())));
    }

    #[test]
    fn test_login_mode_true_is_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [admin]
            login_mode = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_bus_capacity_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [discovery]
            bus_capacity = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("namefix-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[discovery]\nbus_capacity = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(format!("{:#}", err).contains("bus_capacity"));
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::id("i2072").to_string(), "id=i2072");
        assert_eq!(Locator::Css("a.edit".to_string()).to_string(), "css=a.edit");
    }
}
