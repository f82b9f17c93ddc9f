use crate::errors::{KioskError, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_URL: &str = "https://logs-ng.ftntech.fr";
pub const DEFAULT_WINDOW: (u32, u32) = (1920, 1080);
pub const DEFAULT_NAV_TIMEOUT_SECS: u64 = 30;

/// Startup configuration for the kiosk. Read from the environment exactly once
/// at process start; every field is fixed for the lifetime of the process.
///
/// | Env var                  | Field                  | Default               |
/// |--------------------------|------------------------|-----------------------|
/// | `KIOSK_BIND`             | `bind_addr`            | `127.0.0.1:8080`      |
/// | `KIOSK_URL`              | `default_url`          | kiosk landing page    |
/// | `KIOSK_WINDOW`           | `window_width/height`  | `1920x1080`           |
/// | `KIOSK_NAV_TIMEOUT_SECS` | `navigation_timeout`   | `30`                  |
/// | `https_proxy`            | `proxy_server`         | unset                 |
#[derive(Debug, Clone)]
pub struct KioskConfig {
    pub bind_addr: SocketAddr,
    pub default_url: Url,
    pub window_width: u32,
    pub window_height: u32,
    pub proxy_server: Option<String>,
    pub navigation_timeout: Duration,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or(SocketAddr::from(([127, 0, 0, 1], 8080))),
            default_url: Url::parse(DEFAULT_URL).expect("default kiosk URL is a constant"),
            window_width: DEFAULT_WINDOW.0,
            window_height: DEFAULT_WINDOW.1,
            proxy_server: None,
            navigation_timeout: Duration::from_secs(DEFAULT_NAV_TIMEOUT_SECS),
        }
    }
}

impl KioskConfig {
    /// Build the configuration from the process environment, validating every
    /// override. Invalid values are a fatal configuration error rather than a
    /// silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind) = env_nonempty("KIOSK_BIND") {
            config.bind_addr = bind.parse().map_err(|e| {
                KioskError::Configuration(format!("invalid KIOSK_BIND {bind:?}: {e}"))
            })?;
        }

        if let Some(url) = env_nonempty("KIOSK_URL") {
            config.default_url = Url::parse(&url).map_err(|e| {
                KioskError::Configuration(format!("invalid KIOSK_URL {url:?}: {e}"))
            })?;
        }

        if let Some(window) = env_nonempty("KIOSK_WINDOW") {
            let (width, height) = parse_window(&window)?;
            config.window_width = width;
            config.window_height = height;
        }

        if let Some(secs) = env_nonempty("KIOSK_NAV_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                KioskError::Configuration(format!("invalid KIOSK_NAV_TIMEOUT_SECS {secs:?}: {e}"))
            })?;
            config.navigation_timeout = Duration::from_secs(secs);
        }

        // An empty https_proxy counts as unset.
        config.proxy_server = env_nonempty("https_proxy");

        Ok(config)
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_window(value: &str) -> Result<(u32, u32)> {
    let invalid =
        || KioskError::Configuration(format!("invalid KIOSK_WINDOW {value:?}: expected WxH"));

    let (w, h) = value.split_once('x').ok_or_else(invalid)?;
    let width: u32 = w.trim().parse().map_err(|_| invalid())?;
    let height: u32 = h.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}
