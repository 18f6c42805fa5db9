//! Webhook delivery.

use std::time::Duration;

use serde::Serialize;

use crate::error::NotifyError;

const USER_AGENT: &str = concat!("shuttle/", env!("CARGO_PKG_VERSION"));

/// Blocking JSON webhook client. Must not be used from inside an async runtime.
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::blocking::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Request {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { http })
    }

    /// POSTs `payload` as JSON; any non-2xx answer is an error.
    pub fn post<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<(), NotifyError> {
        let response = self.http.post(url).json(payload).send().map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout {
                    url: url.to_string(),
                }
            } else {
                NotifyError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        log::debug!("Webhook {} answered {}", url, status);
        Ok(())
    }
}
