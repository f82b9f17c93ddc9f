use crate::config::KioskConfig;
use crate::errors::{KioskError, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use std::time::Duration;

// The CDP connection is torn down after this much idle time; the session's
// liveness probe fires far more often, so this is never reached in practice.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(86_400);

/// The fixed kiosk flag set: visible window, fullscreen, every interactive
/// chrome surface (dialogs, translate prompts, infobars) suppressed.
pub fn chrome_args(config: &KioskConfig) -> Vec<OsString> {
    vec![
        OsString::from("--start-fullscreen"),
        OsString::from("--noerrdialogs"),
        OsString::from("--disable-translate"),
        OsString::from("--disable-infobars"),
        OsString::from("--disable-dev-shm-usage"),
        OsString::from(format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        )),
    ]
}

/// Launch one Chrome instance with the kiosk flag set and open its initial
/// tab. Blocking; callers drive this through `spawn_blocking`.
pub fn launch_browser(config: &KioskConfig) -> Result<(Browser, Arc<Tab>)> {
    let owned_args = chrome_args(config);
    let args: Vec<&OsStr> = owned_args.iter().map(AsRef::as_ref).collect();

    let launch_options = LaunchOptions::default_builder()
        .headless(false)
        .args(args)
        .proxy_server(config.proxy_server.as_deref())
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|e| KioskError::Launch(e.to_string()))?;

    let browser = Browser::new(launch_options).map_err(|e| KioskError::Launch(e.to_string()))?;

    let tab = browser
        .new_tab()
        .map_err(|e| KioskError::Launch(e.to_string()))?;

    Ok((browser, tab))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_the_kiosk_flag_set() {
        let config = KioskConfig::default();
        let args = chrome_args(&config);

        for expected in [
            "--start-fullscreen",
            "--noerrdialogs",
            "--disable-translate",
            "--disable-infobars",
            "--window-size=1920,1080",
        ] {
            assert!(
                args.iter().any(|a| a == expected),
                "missing {expected} in {args:?}"
            );
        }
    }

    #[test]
    fn window_size_follows_config() {
        let config = KioskConfig {
            window_width: 1280,
            window_height: 720,
            ..KioskConfig::default()
        };
        let args = chrome_args(&config);
        assert!(args.iter().any(|a| a == "--window-size=1280,720"));
    }
}
