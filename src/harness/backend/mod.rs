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

//! Narrow interfaces to the identity, network and compute services.
//!
//! Every call is blocking and runs under the [`Session`] passed to it.
//! Implementations surface the service's own failures as [`BackendError`].

mod memory;
mod model;

pub use memory::{BackendCall, InMemoryCloud};
pub use model::{
    Credentials, Direction, Domain, Flavor, FloatingIp, Group, Image, Keypair, Network, Project,
    Protocol, ResourceKind, Role, Router, SecurityGroup, SecurityGroupRule, SecurityGroupRuleSpec,
    Server, ServerSpec, ServerStatus, Session, Subnet, SubnetSpec, User,
};

use crate::harness::error::BackendError;

pub type BackendResult<T> = Result<T, BackendError>;

pub trait Authenticator: Send + Sync {
    /// Authenticate `credentials`, scoped to the named project when `scope` is set.
    fn authenticate(
        &self,
        credentials: &Credentials,
        scope: Option<&str>,
    ) -> BackendResult<Session>;
}

pub trait IdentityApi: Send + Sync {
    fn create_project(
        &self,
        session: &Session,
        name: &str,
        domain_id: Option<&str>,
    ) -> BackendResult<Project>;
    fn delete_project(&self, session: &Session, project_id: &str) -> BackendResult<()>;
    fn find_project(&self, session: &Session, name: &str) -> BackendResult<Project>;
    fn list_projects(&self, session: &Session) -> BackendResult<Vec<Project>>;

    fn create_user(
        &self,
        session: &Session,
        name: &str,
        password: &str,
        domain_id: Option<&str>,
    ) -> BackendResult<User>;
    fn delete_user(&self, session: &Session, user_id: &str) -> BackendResult<()>;
    fn find_user(&self, session: &Session, name: &str) -> BackendResult<User>;
    fn list_users(&self, session: &Session) -> BackendResult<Vec<User>>;

    fn create_domain(&self, session: &Session, name: &str) -> BackendResult<Domain>;
    fn set_domain_enabled(
        &self,
        session: &Session,
        domain_id: &str,
        enabled: bool,
    ) -> BackendResult<Domain>;
    fn delete_domain(&self, session: &Session, domain_id: &str) -> BackendResult<()>;

    fn create_group(
        &self,
        session: &Session,
        name: &str,
        domain_id: Option<&str>,
    ) -> BackendResult<Group>;
    fn delete_group(&self, session: &Session, group_id: &str) -> BackendResult<()>;

    fn find_role(&self, session: &Session, name: &str) -> BackendResult<Role>;
    fn grant_role(
        &self,
        session: &Session,
        role_id: &str,
        user_id: &str,
        project_id: &str,
    ) -> BackendResult<()>;
    fn revoke_role(
        &self,
        session: &Session,
        role_id: &str,
        user_id: &str,
        project_id: &str,
    ) -> BackendResult<()>;
}

pub trait NetworkApi: Send + Sync {
    fn create_network(&self, session: &Session, name: &str) -> BackendResult<Network>;
    fn delete_network(&self, session: &Session, network_id: &str) -> BackendResult<()>;
    fn find_network(&self, session: &Session, name: &str) -> BackendResult<Network>;
    fn list_networks(&self, session: &Session) -> BackendResult<Vec<Network>>;

    fn create_subnet(&self, session: &Session, spec: &SubnetSpec) -> BackendResult<Subnet>;
    fn delete_subnet(&self, session: &Session, subnet_id: &str) -> BackendResult<()>;
    fn list_subnets(
        &self,
        session: &Session,
        network_id: Option<&str>,
    ) -> BackendResult<Vec<Subnet>>;

    fn create_router(&self, session: &Session, name: &str) -> BackendResult<Router>;
    fn delete_router(&self, session: &Session, router_id: &str) -> BackendResult<()>;
    fn list_routers(&self, session: &Session) -> BackendResult<Vec<Router>>;
    fn add_router_interface(
        &self,
        session: &Session,
        router_id: &str,
        subnet_id: &str,
    ) -> BackendResult<()>;
    fn remove_router_interface(
        &self,
        session: &Session,
        router_id: &str,
        subnet_id: &str,
    ) -> BackendResult<()>;
    fn add_router_gateway(
        &self,
        session: &Session,
        router_id: &str,
        network_id: &str,
    ) -> BackendResult<()>;
    fn remove_router_gateway(&self, session: &Session, router_id: &str) -> BackendResult<()>;

    fn list_security_groups(
        &self,
        session: &Session,
        project_id: Option<&str>,
    ) -> BackendResult<Vec<SecurityGroup>>;
    fn create_security_group_rule(
        &self,
        session: &Session,
        spec: &SecurityGroupRuleSpec,
    ) -> BackendResult<SecurityGroupRule>;
    fn delete_security_group_rule(&self, session: &Session, rule_id: &str) -> BackendResult<()>;
}

pub trait ComputeApi: Send + Sync {
    fn create_server(&self, session: &Session, spec: &ServerSpec) -> BackendResult<Server>;
    fn delete_server(&self, session: &Session, server_id: &str) -> BackendResult<()>;
    fn get_server(&self, session: &Session, server_id: &str) -> BackendResult<Server>;

    fn find_flavor(&self, session: &Session, name: &str) -> BackendResult<Flavor>;
    fn find_image(&self, session: &Session, name: &str) -> BackendResult<Image>;

    fn create_keypair(&self, session: &Session, name: &str) -> BackendResult<Keypair>;
    fn delete_keypair(&self, session: &Session, name: &str) -> BackendResult<()>;

    fn create_floating_ip(&self, session: &Session, pool: &str) -> BackendResult<FloatingIp>;
    fn delete_floating_ip(&self, session: &Session, floating_ip_id: &str) -> BackendResult<()>;
    fn associate_floating_ip(
        &self,
        session: &Session,
        server_id: &str,
        ip: &str,
    ) -> BackendResult<()>;
}

/// Everything a fixture may need from the control plane.
pub trait CloudBackend: Authenticator + IdentityApi + NetworkApi + ComputeApi {}

impl<T> CloudBackend for T where T: Authenticator + IdentityApi + NetworkApi + ComputeApi {}
