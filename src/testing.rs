use crate::browser::Navigator;
use crate::errors::{KioskError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Test double for the browser session: records every navigate call and can
/// be told to fail or stall, so the control endpoint is testable without a
/// Chrome binary on the machine.
#[derive(Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<String>>,
    fail_with: Option<String>,
    delay: Option<Duration>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every navigate call will fail with `message` (after being recorded).
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Every navigate call sleeps for `delay` before returning.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, url: &str) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(message) => Err(KioskError::Navigation(message.clone())),
            None => Ok(()),
        }
    }
}
