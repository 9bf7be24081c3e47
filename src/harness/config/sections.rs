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

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::time::Duration;

pub const SUBNET_PLACEHOLDER: &str = "{subnet}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// CIDR template, `{subnet}` is replaced by an index from the subnet pool.
    pub cidr: String,
    pub external_network: String,
    pub subnet_range: SubnetRange,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.1.{subnet}.0/24".to_string(),
            external_network: "public".to_string(),
            subnet_range: SubnetRange::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetRange {
    pub first: u16,
    pub last: u16,
}

impl Default for SubnetRange {
    fn default() -> Self {
        Self {
            first: 11,
            last: 254,
        }
    }
}

impl SubnetRange {
    pub fn len(&self) -> usize {
        if self.last < self.first {
            0
        } else {
            usize::from(self.last - self.first) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastImageConfig {
    pub flavor_name: String,
    pub image_name: String,
    /// Login user baked into the image.
    pub user_name: String,
}

impl Default for FastImageConfig {
    fn default() -> Self {
        Self {
            flavor_name: "m1.tiny".to_string(),
            image_name: "cirros-0.3.4-x86_64-uec".to_string(),
            user_name: "cirros".to_string(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub server_status: humantime::Duration,
    #[serde_as(as = "DisplayFromStr")]
    pub ip_address: humantime::Duration,
    #[serde_as(as = "DisplayFromStr")]
    pub server_delete: humantime::Duration,
    #[serde_as(as = "DisplayFromStr")]
    pub command: humantime::Duration,
    #[serde_as(as = "DisplayFromStr")]
    pub poll_interval: humantime::Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            server_status: Duration::from_secs(60).into(),
            ip_address: Duration::from_secs(60).into(),
            server_delete: Duration::from_secs(60).into(),
            command: Duration::from_secs(60).into(),
            poll_interval: Duration::from_secs(1).into(),
        }
    }
}

impl TimeoutsConfig {
    pub fn server_status(&self) -> Duration {
        *self.server_status
    }

    pub fn ip_address(&self) -> Duration {
        *self.ip_address
    }

    pub fn server_delete(&self) -> Duration {
        *self.server_delete
    }

    pub fn command(&self) -> Duration {
        *self.command
    }

    pub fn poll_interval(&self) -> Duration {
        *self.poll_interval
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub retry_attempts: u32,
    #[serde_as(as = "DisplayFromStr")]
    pub retry_delay: humantime::Duration,
    /// Extra `-o` options handed to ssh.
    pub ssh_options: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            retry_delay: Duration::from_secs(5).into(),
            ssh_options: vec![
                "StrictHostKeyChecking=no".to_string(),
                "UserKnownHostsFile=/dev/null".to_string(),
                "LogLevel=ERROR".to_string(),
            ],
        }
    }
}

impl RemoteConfig {
    pub fn retry_delay(&self) -> Duration {
        *self.retry_delay
    }
}
