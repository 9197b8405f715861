use crate::config::ConnectionProfile;
use crate::constants::STATUS_RESPONSE_FORMAT;
use crate::error::{PollerError, Result};
use crate::models::{PendingRecord, StatusResult};
use reqwest::Url;
use tracing::{debug, instrument};

/// Client for the SMSC status endpoint.
#[derive(Debug, Clone)]
pub struct StatusOracleClient {
    base_url: Url,
    http: reqwest::Client,
}

impl StatusOracleClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            PollerError::configuration(format!("invalid status URL {base_url}: {e}"))
        })?;
        Ok(Self { base_url, http })
    }

    /// Query URL for one record; login, password and phone are
    /// form-encoded.
    pub fn status_url(&self, profile: &ConnectionProfile, record: &PendingRecord) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("login", &profile.login)
            .append_pair("psw", &profile.password)
            .append_pair("phone", &record.phone)
            .append_pair("id", &record.external_id.to_string())
            .append_pair("fmt", STATUS_RESPONSE_FORMAT);
        url
    }

    /// Fetch and decode the status of one record. Transport and body-read
    /// failures are errors; an undecodable body is not (see
    /// [`StatusResult::decode`]).
    #[instrument(skip_all, fields(record_id = record.id, external_id = record.external_id))]
    pub async fn query(
        &self,
        profile: &ConnectionProfile,
        record: &PendingRecord,
    ) -> Result<StatusResult> {
        let oracle_error = |e: reqwest::Error| PollerError::StatusOracle {
            external_id: record.external_id,
            // the URL carries credentials
            message: e.without_url().to_string(),
        };

        let response = self
            .http
            .get(self.status_url(profile, record))
            .send()
            .await
            .map_err(oracle_error)?;
        let http_status = response.status();
        let body = response.bytes().await.map_err(oracle_error)?;

        let result = StatusResult::decode(&body);
        debug!(
            http_status = http_status.as_u16(),
            status = result.status,
            err = result.err,
            error_code = result.error_code,
            "Status API replied"
        );
        Ok(result)
    }
}
