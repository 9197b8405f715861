//! # Gateway Routing Table
//!
//! Reads the Kannel configuration file that the poller shares with the SMS
//! gateway. Only two kinds of groups matter:
//!
//! - `group = smsc` sections, keyed by their `smsc-id`, provide the login and
//!   password used against the status API for records routed through that
//!   gateway.
//! - the single `group = pgsql-connection` section locates the `dlr` table.
//!
//! The table is built once at startup and shared read-only by every worker.

use crate::constants::storage;
use crate::error::{PollerError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Credentials for one upstream gateway.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub login: String,
    pub password: String,
    pub host: String,
    pub port: String,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("login", &self.login)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Coordinates of the Postgres database holding the `dlr` table.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageProfile {
    pub connection: ConnectionProfile,
    pub database: String,
}

impl Default for StorageProfile {
    fn default() -> Self {
        Self {
            connection: ConnectionProfile {
                host: storage::DEFAULT_HOST.to_string(),
                port: storage::DEFAULT_PORT.to_string(),
                ..Default::default()
            },
            database: storage::DEFAULT_DATABASE.to_string(),
        }
    }
}

impl fmt::Debug for StorageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageProfile")
            .field("connection", &self.connection)
            .field("database", &self.database)
            .finish()
    }
}

impl StorageProfile {
    /// Postgres connection URL with credentials percent-encoded.
    pub fn database_url(&self) -> Result<String> {
        let base = format!(
            "postgres://{}:{}/{}",
            self.connection.host, self.connection.port, self.database
        );
        let mut url = reqwest::Url::parse(&base).map_err(|e| {
            PollerError::configuration(format!("invalid storage coordinates {base}: {e}"))
        })?;
        let invalid = |_| PollerError::configuration("storage URL cannot carry credentials");
        url.set_username(&self.connection.login).map_err(invalid)?;
        if !self.connection.password.is_empty() {
            url.set_password(Some(&self.connection.password))
                .map_err(invalid)?;
        }
        url.query_pairs_mut().append_pair("sslmode", "disable");
        Ok(url.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    gateways: HashMap<String, ConnectionProfile>,
    storage: Option<StorageProfile>,
}

/// Section the parser is currently filling.
enum Section {
    None,
    /// `group = smsc` seen, `smsc-id` not yet.
    AnonymousGateway(ConnectionProfile),
    Gateway(String),
    Storage,
}

impl RoutingTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PollerError::RoutingTable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let table = Self::parse(&text);
        debug!(
            path = %path.display(),
            gateways = table.gateways.len(),
            has_storage = table.storage.is_some(),
            "Loaded routing table"
        );
        Ok(table)
    }

    /// Parse Kannel's `key = value` format. Lines that do not split into
    /// exactly two parts on `=` are ignored, as are unknown keys and groups.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        let mut section = Section::None;

        for line in text.lines() {
            let parts: Vec<&str> = line.split('=').map(str::trim).collect();
            let [key, value] = parts.as_slice() else {
                continue;
            };

            if *key == "group" {
                table.close_section(std::mem::replace(&mut section, Section::None));
                section = match *value {
                    "smsc" => Section::AnonymousGateway(ConnectionProfile::default()),
                    "pgsql-connection" => {
                        table.storage = Some(StorageProfile::default());
                        Section::Storage
                    }
                    _ => Section::None,
                };
                continue;
            }

            if *key == "smsc-id" {
                section = match std::mem::replace(&mut section, Section::None) {
                    Section::AnonymousGateway(profile) => {
                        table.gateways.insert(value.to_string(), profile);
                        Section::Gateway(value.to_string())
                    }
                    // a second smsc-id re-keys the same section
                    Section::Gateway(current) => match table.gateways.remove(&current) {
                        Some(profile) => {
                            table.gateways.insert(value.to_string(), profile);
                            Section::Gateway(value.to_string())
                        }
                        None => Section::Gateway(current),
                    },
                    other => other,
                };
                continue;
            }

            let target = match &mut section {
                Section::None => continue,
                Section::AnonymousGateway(profile) => Some(profile),
                Section::Gateway(id) => table.gateways.get_mut(id.as_str()),
                Section::Storage => table.storage.as_mut().map(|s| &mut s.connection),
            };
            let Some(profile) = target else { continue };

            match *key {
                "host" => profile.host = value.to_string(),
                "port" => profile.port = value.to_string(),
                "smsc-username" | "username" => profile.login = value.to_string(),
                "smsc-password" | "password" => profile.password = value.to_string(),
                "database" => {
                    if let (Section::Storage, Some(storage)) = (&section, table.storage.as_mut()) {
                        storage.database = value.to_string();
                    }
                }
                _ => {}
            }
        }

        table.close_section(section);
        table
    }

    fn close_section(&mut self, section: Section) {
        if let Section::AnonymousGateway(profile) = section {
            warn!(
                host = %profile.host,
                "Discarding smsc group without smsc-id"
            );
        }
    }

    pub fn get(&self, gateway_key: &str) -> Option<&ConnectionProfile> {
        self.gateways.get(gateway_key)
    }

    pub fn storage(&self) -> Result<&StorageProfile> {
        self.storage.as_ref().ok_or_else(|| {
            PollerError::configuration("no pgsql-connection group in routing configuration")
        })
    }

    pub fn gateway_count(&self) -> usize {
        self.gateways.len()
    }

    pub fn gateway_keys(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }

    /// Add or replace one gateway entry.
    pub fn with_gateway(mut self, key: impl Into<String>, profile: ConnectionProfile) -> Self {
        self.gateways.insert(key.into(), profile);
        self
    }
}
