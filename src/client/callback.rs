use crate::constants::SMSC_ERROR_HEADER;
use crate::error::{PollerError, Result};
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Substitute `status` for the first `%d` in a callback URL template.
/// Templates without a placeholder are returned unchanged.
pub fn render_callback_url(template: &str, status: i64) -> String {
    match template.find("%d") {
        Some(pos) => format!("{}{}{}", &template[..pos], status, &template[pos + 2..]),
        None => template.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct CallbackClient {
    http: reqwest::Client,
}

impl CallbackClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// GET the rendered callback URL, attaching `SMSC-ERROR` when `err` is
    /// given, and read the body to completion.
    ///
    /// Any HTTP response counts as a completed round trip; a non-success
    /// status is only logged.
    pub async fn notify(&self, template: &str, status: i64, err: Option<i64>) -> Result<StatusCode> {
        let url = render_callback_url(template, status);
        let callback_error = |e: reqwest::Error| PollerError::Callback {
            url: url.clone(),
            message: e.without_url().to_string(),
        };

        let mut request = self.http.get(&url);
        if let Some(err) = err {
            request = request.header(SMSC_ERROR_HEADER, err.to_string());
        }

        let response = request.send().await.map_err(callback_error)?;
        let http_status = response.status();
        response.bytes().await.map_err(callback_error)?;

        if http_status.is_success() {
            debug!(url = %url, http_status = http_status.as_u16(), "Callback delivered");
        } else {
            warn!(url = %url, http_status = http_status.as_u16(), "Callback answered with non-success status");
        }
        Ok(http_status)
    }
}
