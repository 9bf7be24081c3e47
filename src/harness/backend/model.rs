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

//! Resources as the control plane reports them.

use std::collections::BTreeMap;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Session,
    Project,
    User,
    Domain,
    Group,
    Role,
    RoleAssignment,
    Network,
    Subnet,
    Router,
    RouterInterface,
    RouterGateway,
    SecurityGroup,
    SecurityGroupRule,
    Server,
    Flavor,
    Image,
    Keypair,
    FloatingIp,
}

/// Lifecycle status of a compute instance.
///
/// Only `Active` and `Error` are terminal while waiting for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    Build,
    Active,
    Error,
    Deleted,
    Shutoff,
    Other(String),
}

impl ServerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerStatus::Active | ServerStatus::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ServerStatus::Build => "BUILD",
            ServerStatus::Active => "ACTIVE",
            ServerStatus::Error => "ERROR",
            ServerStatus::Deleted => "DELETED",
            ServerStatus::Shutoff => "SHUTOFF",
            ServerStatus::Other(status) => status,
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ServerStatus {
    fn from(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "BUILD" => ServerStatus::Build,
            "ACTIVE" => ServerStatus::Active,
            "ERROR" => ServerStatus::Error,
            "DELETED" => ServerStatus::Deleted,
            "SHUTOFF" => ServerStatus::Shutoff,
            other => ServerStatus::Other(other.to_string()),
        }
    }
}

/// Authenticated handle for one (principal, scope) pair.
///
/// A single session is valid against every service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal: String,
    pub scope: Option<String>,
    pub token: String,
    pub user_id: String,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub user_domain: String,
    pub project_domain: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            user_domain: "default".to_string(),
            project_domain: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub project_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub ip_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub ip_version: u8,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    pub id: String,
    pub name: String,
    pub project_id: Option<String>,
    /// Subnet ids of attached interfaces, in attach order.
    pub interfaces: Vec<String>,
    pub gateway_network_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupRuleSpec {
    pub security_group_id: String,
    pub direction: Direction,
    pub protocol: Protocol,
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupRule {
    pub id: String,
    pub security_group_id: String,
    pub direction: Direction,
    pub protocol: Protocol,
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flavor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerSpec {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub network_ids: Vec<String>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: ServerStatus,
    /// Addresses keyed by network label, in assignment order.
    pub addresses: BTreeMap<String, Vec<String>>,
    pub key_name: Option<String>,
}

impl Server {
    pub fn has_addresses(&self) -> bool {
        self.addresses.values().any(|ips| !ips.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub name: String,
    pub public_key: String,
    /// Only returned when the backend generated the key.
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingIp {
    pub id: String,
    pub ip: String,
    pub pool: String,
    pub server_id: Option<String>,
}
