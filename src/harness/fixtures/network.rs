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

use super::{Actor, tolerate_not_found};
use crate::harness::backend::{Network, Subnet, SubnetSpec};
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use crate::harness::services::Services;
use std::sync::Arc;
use tracing::info;

/// A tenant network with one IPv4 subnet.
///
/// The subnet's CIDR block comes from the shared subnet pool, so concurrent
/// scenarios never collide. The block goes back to the pool once the subnet
/// is gone; a subnet that cannot be deleted keeps its block issued.
#[derive(Debug, Clone, Default)]
pub struct NetworkFixture {
    actor: Actor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub network: Network,
    pub subnet: Subnet,
    pub subnet_index: u16,
}

impl NetworkHandle {
    pub fn id(&self) -> &str {
        &self.network.id
    }

    pub fn name(&self) -> &str {
        &self.network.name
    }

    pub fn cidr(&self) -> &str {
        &self.subnet.cidr
    }
}

impl NetworkFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the network inside `project_name`, acting as the admin.
    pub fn in_project(mut self, project_name: impl Into<String>) -> Self {
        self.actor = Actor::AdminIn(project_name.into());
        self
    }

    fn create(
        &self,
        scenario: &mut Scenario,
        services: &Arc<Services>,
        subnet_index: u16,
    ) -> Result<(Network, Subnet), HarnessError> {
        let session = self.actor.session(services)?;
        let name = services.names().make_object_name("network");
        let network = services.backend().create_network(&session, &name)?;
        info!("Created network {} ({})", network.name, network.id);

        let network_id = network.id.clone();
        let actor = self.actor.clone();
        let cleanup_services = Arc::clone(services);
        scenario.add_cleanup(format!("delete network {name}"), move || {
            let session = actor.session(&cleanup_services)?;
            cleanup_services
                .backend()
                .delete_network(&session, &network_id)?;
            info!("Deleted network {network_id}");
            Ok(())
        });

        let spec = SubnetSpec {
            name: services.names().make_object_name("subnet"),
            network_id: network.id.clone(),
            cidr: services.config().cidr_for(subnet_index),
            ip_version: 4,
        };
        let subnet = services.backend().create_subnet(&session, &spec)?;
        info!(
            "Created subnet {} ({}) with CIDR {}",
            subnet.name, subnet.id, subnet.cidr
        );
        Ok((network, subnet))
    }
}

impl Fixture for NetworkFixture {
    type Handle = NetworkHandle;

    fn kind(&self) -> &'static str {
        "network"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<NetworkHandle, HarnessError> {
        let services = Arc::clone(scenario.services());

        let subnet_index = services.subnets().acquire()?;
        let (network, subnet) = match self.create(scenario, &services, subnet_index) {
            Ok(created) => created,
            Err(e) => {
                // No subnet ever held the index.
                services.subnets().release(subnet_index)?;
                return Err(e);
            }
        };

        let subnet_id = subnet.id.clone();
        let actor = self.actor;
        scenario.add_cleanup(format!("delete subnet {}", subnet.name), move || {
            let session = actor.session(&services)?;
            tolerate_not_found(
                services.backend().delete_subnet(&session, &subnet_id),
                "subnet",
            )?;
            info!("Deleted subnet {subnet_id}");
            services.subnets().release(subnet_index)
        });

        let network = Network {
            subnet_ids: vec![subnet.id.clone()],
            ..network
        };
        Ok(NetworkHandle {
            network,
            subnet,
            subnet_index,
        })
    }
}

/// Look up a network not owned by the scenario, e.g. the external network.
pub fn find_network(services: &Services, name: &str) -> Result<Network, HarnessError> {
    let session = services.admin_session()?;
    Ok(services.backend().find_network(&session, name)?)
}
