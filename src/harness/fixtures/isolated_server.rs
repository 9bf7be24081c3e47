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

use super::{
    FloatingIpHandle, KeypairFixture, KeypairHandle, NetworkFixture, NetworkHandle,
    ProjectFixture, ProjectHandle, RouterFixture, RouterHandle, SecurityGroupRuleFixture,
    SecurityGroupRuleHandle, ServerFixture, ServerHandle, UserFixture, UserHandle, find_network,
};
use crate::harness::backend::{Direction, Protocol};
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use std::sync::Arc;
use tracing::info;

const MEMBER_ROLE: &str = "Member";
const SSH_PORT: u16 = 22;

/// A server reachable from outside, in a project of its own.
///
/// Builds project, user, network, security rules, keypair and a router to
/// the external network, boots the server and gives it a floating IP. Every
/// piece is its own fixture, so teardown runs in exact reverse and a
/// failure part way through still releases what was built.
#[derive(Debug, Clone, Default)]
pub struct IsolatedServerFixture;

#[derive(Debug, Clone)]
pub struct IsolatedServerHandle {
    pub project: ProjectHandle,
    pub user: UserHandle,
    pub network: NetworkHandle,
    pub security_group_rules: Vec<SecurityGroupRuleHandle>,
    pub keypair: KeypairHandle,
    pub router: RouterHandle,
    pub server: ServerHandle,
    pub internal_ips: Vec<String>,
    pub floating_ip: FloatingIpHandle,
}

impl Fixture for IsolatedServerFixture {
    type Handle = IsolatedServerHandle;

    fn kind(&self) -> &'static str {
        "isolated_server"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<IsolatedServerHandle, HarnessError> {
        let services = Arc::clone(scenario.services());

        let project = scenario.use_fixture(ProjectFixture::new())?;
        let user = scenario.use_fixture(UserFixture::new())?;
        project.grant_role(scenario, &user, MEMBER_ROLE)?;

        let network = scenario.use_fixture(NetworkFixture::new().in_project(&project.name))?;

        let security_group_rules = vec![
            scenario.use_fixture(SecurityGroupRuleFixture::new(
                &project,
                Direction::Egress,
                Protocol::Icmp,
            ))?,
            scenario.use_fixture(
                SecurityGroupRuleFixture::new(&project, Direction::Ingress, Protocol::Tcp)
                    .ports(SSH_PORT, SSH_PORT),
            )?,
        ];

        let keypair = scenario.use_fixture(KeypairFixture::new().owned_by(&user, &project))?;

        let router = scenario.use_fixture(RouterFixture::new().in_project(&project.name))?;
        router.add_interface(&network.subnet.id)?;
        let external = find_network(&services, &services.config().network.external_network)?;
        router.add_gateway(&external.id)?;

        let server = scenario.use_fixture(
            ServerFixture::new(&network)
                .with_keypair(&keypair)
                .owned_by(&user, &project),
        )?;
        let internal_ips =
            server.ip_addresses(Some(network.name()), services.config().timeouts.ip_address())?;
        let floating_ip = server.add_floating_ip(scenario, None)?;
        info!(
            "Isolated server {} is up at {} (internal {:?})",
            server.id(),
            floating_ip.ip,
            internal_ips
        );

        Ok(IsolatedServerHandle {
            project,
            user,
            network,
            security_group_rules,
            keypair,
            router,
            server,
            internal_ips,
            floating_ip,
        })
    }
}
