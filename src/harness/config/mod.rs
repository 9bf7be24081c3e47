/*
 * Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

//! Harness configuration.
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `CLOUD_HARNESS_*` environment variables (nested keys split on `__`,
//! e.g. `CLOUD_HARNESS_NETWORK__EXTERNAL_NETWORK`).

mod sections;

pub use sections::{
    FastImageConfig, NetworkConfig, RemoteConfig, SUBNET_PLACEHOLDER, SubnetRange, TimeoutsConfig,
};

use crate::harness::backend::Credentials;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

pub const CONFIG_FILE_NAME: &str = "cloud-harness.toml";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/cloud-harness/cloud-harness.toml";
pub const ENV_PREFIX: &str = "CLOUD_HARNESS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot load configuration: {0}")]
    CannotLoad(#[source] Box<figment::Error>),
    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub admin_project: String,
    pub user_domain: String,
    pub project_domain: String,
    pub network: NetworkConfig,
    pub fast_image: FastImageConfig,
    pub timeouts: TimeoutsConfig,
    pub remote: RemoteConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://localhost:5000/v3".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            admin_project: "admin".to_string(),
            user_domain: "default".to_string(),
            project_domain: "default".to_string(),
            network: NetworkConfig::default(),
            fast_image: FastImageConfig::default(),
            timeouts: TimeoutsConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load from `cloud-harness.toml` in the working directory, falling back
    /// to the system-wide file.
    pub fn load() -> Result<Self, ConfigError> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            Self::load_from(&local)
        } else {
            Self::load_from(Path::new(SYSTEM_CONFIG_PATH))
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from path: '{}'...", path.display());
        let mut figment = Figment::from(Serialized::defaults(HarnessConfig::default()));
        if path.is_file() {
            figment = figment.merge(Toml::file(path));
        } else {
            warn!(
                "Configuration file not found at path: '{}', using defaults.",
                path.display()
            );
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: HarnessConfig = figment.extract().map_err(|e| {
            error!("Failed to load config: {e}");
            ConfigError::CannotLoad(Box::new(e))
        })?;
        config.validate()?;
        info!("Config loaded successfully: {config}");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "auth_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "username",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.network.cidr.contains(SUBNET_PLACEHOLDER) {
            return Err(ConfigError::Invalid {
                key: "network.cidr",
                reason: format!("template must contain {SUBNET_PLACEHOLDER}"),
            });
        }
        let range = self.network.subnet_range;
        if range.is_empty() || range.last > 255 {
            return Err(ConfigError::Invalid {
                key: "network.subnet_range",
                reason: format!("{}..={} is not a usable range", range.first, range.last),
            });
        }
        Ok(())
    }

    pub fn cidr_for(&self, subnet: u16) -> String {
        self.network
            .cidr
            .replace(SUBNET_PLACEHOLDER, &subnet.to_string())
    }

    pub fn admin_credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            user_domain: self.user_domain.clone(),
            project_domain: self.project_domain.clone(),
        }
    }
}

impl Display for HarnessConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ auth_url: {}, username: {}, password: ******, admin_project: {}, cidr: {}, external_network: {}, subnet_range: {}..={}, image: {}, flavor: {} }}",
            self.auth_url,
            self.username,
            self.admin_project,
            self.network.cidr,
            self.network.external_network,
            self.network.subnet_range.first,
            self.network.subnet_range.last,
            self.fast_image.image_name,
            self.fast_image.flavor_name,
        )
    }
}
