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

use super::{Actor, FloatingIpFixture, FloatingIpHandle, KeypairHandle, NetworkHandle, ProjectHandle, UserHandle};
use crate::harness::backend::{Server, ServerSpec, ServerStatus};
use crate::harness::error::HarnessError;
use crate::harness::polling::{RetryPolicy, poll_until};
use crate::harness::remote::{CommandOutput, RemoteTarget, run_remote_command_with_retry};
use crate::harness::scenario::{Fixture, Scenario};
use crate::harness::services::Services;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A compute instance booted from the configured fast image and flavor.
#[derive(Debug, Clone, Default)]
pub struct ServerFixture {
    network_ids: Vec<String>,
    keypair: Option<KeypairHandle>,
    user_data: Option<String>,
    actor: Actor,
}

#[derive(Debug, Clone)]
pub struct ServerHandle {
    pub server: Server,
    key_file: Option<PathBuf>,
    services: Arc<Services>,
    actor: Actor,
}

impl ServerFixture {
    pub fn new(network: &NetworkHandle) -> Self {
        Self {
            network_ids: vec![network.id().to_string()],
            ..Self::default()
        }
    }

    pub fn with_network(mut self, network: &NetworkHandle) -> Self {
        self.network_ids.push(network.id().to_string());
        self
    }

    /// Inject the keypair at boot. It cannot be changed afterwards.
    pub fn with_keypair(mut self, keypair: &KeypairHandle) -> Self {
        self.keypair = Some(keypair.clone());
        self
    }

    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn owned_by(mut self, user: &UserHandle, project: &ProjectHandle) -> Self {
        self.actor = Actor::User {
            credentials: user.credentials(),
            project: project.name.clone(),
        };
        self
    }
}

impl Fixture for ServerFixture {
    type Handle = ServerHandle;

    fn kind(&self) -> &'static str {
        "server"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["network"]
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<ServerHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = self.actor.session(&services)?;
        let config = services.config();
        let flavor = services
            .backend()
            .find_flavor(&session, &config.fast_image.flavor_name)?;
        let image = services
            .backend()
            .find_image(&session, &config.fast_image.image_name)?;

        let spec = ServerSpec {
            name: services.names().make_object_name("server"),
            image_id: image.id,
            flavor_id: flavor.id,
            network_ids: self.network_ids,
            key_name: self.keypair.as_ref().map(|k| k.name.clone()),
            user_data: self.user_data,
        };
        let server = services.backend().create_server(&session, &spec)?;
        info!("Created server {} ({})", server.name, server.id);

        let handle = ServerHandle {
            server,
            key_file: self.keypair.and_then(|k| k.private_key_file),
            services,
            actor: self.actor,
        };
        let teardown = handle.clone();
        scenario.add_cleanup(format!("delete server {}", spec.name), move || {
            teardown.delete_and_wait()
        });
        Ok(handle)
    }
}

impl ServerHandle {
    pub fn id(&self) -> &str {
        &self.server.id
    }

    pub fn name(&self) -> &str {
        &self.server.name
    }

    /// Current state as the backend reports it.
    pub fn refresh(&self) -> Result<Server, HarnessError> {
        let session = self.actor.session(&self.services)?;
        Ok(self.services.backend().get_server(&session, &self.server.id)?)
    }

    /// Poll until the server reaches one of `success`, failing early on any
    /// of `failure`.
    pub fn wait_for_status(
        &self,
        success: &[ServerStatus],
        failure: &[ServerStatus],
        timeout: Duration,
    ) -> Result<Server, HarnessError> {
        let interval = self.services.config().timeouts.poll_interval();
        poll_until(
            &format!("server {} to reach {success:?}", self.server.id),
            timeout,
            interval,
            || {
                let server = self.refresh()?;
                debug!("Server {} is {}", server.id, server.status);
                if success.contains(&server.status) {
                    Ok(Some(server))
                } else if failure.contains(&server.status) {
                    Err(HarnessError::ServerStatus {
                        server: server.id,
                        status: server.status,
                    })
                } else {
                    Ok(None)
                }
            },
        )
    }

    /// Wait for the server to settle, then for an address on
    /// `network_label` (any network when `None`).
    pub fn ip_addresses(
        &self,
        network_label: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<String>, HarnessError> {
        self.wait_for_status(&[ServerStatus::Active], &[ServerStatus::Error], timeout)?;
        let interval = self.services.config().timeouts.poll_interval();
        poll_until(
            &format!("an address on server {}", self.server.id),
            timeout,
            interval,
            || {
                let server = self.refresh()?;
                let addresses = match network_label {
                    Some(label) => server.addresses.get(label).cloned(),
                    None => server.addresses.values().find(|ips| !ips.is_empty()).cloned(),
                };
                Ok(addresses.filter(|ips| !ips.is_empty()))
            },
        )
    }

    /// Allocate a floating IP and associate it once the server has an
    /// internal address.
    pub fn add_floating_ip(
        &self,
        scenario: &mut Scenario,
        pool: Option<&str>,
    ) -> Result<FloatingIpHandle, HarnessError> {
        self.ip_addresses(None, self.services.config().timeouts.ip_address())?;
        let mut fixture = FloatingIpFixture::new().acting_as(self.actor.clone());
        if let Some(pool) = pool {
            fixture = fixture.from_pool(pool);
        }
        let floating_ip = scenario.use_fixture(fixture)?;

        let session = self.actor.session(&self.services)?;
        self.services
            .backend()
            .associate_floating_ip(&session, &self.server.id, &floating_ip.ip)?;
        info!(
            "Associated floating IP {} with server {}",
            floating_ip.ip, self.server.id
        );
        Ok(floating_ip)
    }

    /// Where commands for this server go: its newest address (the floating
    /// one once associated), logging in as the image user.
    pub fn remote_target(&self) -> Result<RemoteTarget, HarnessError> {
        let server = self.refresh()?;
        let host = server
            .addresses
            .values()
            .find_map(|ips| ips.last())
            .cloned()
            .ok_or_else(|| {
                HarnessError::invalid_state(format!("server {} has no address", server.id))
            })?;
        let config = self.services.config();
        let mut target = RemoteTarget::new(host, &config.fast_image.user_name)
            .with_options(config.remote.ssh_options.clone());
        if let Some(key_file) = &self.key_file {
            target = target.with_key_file(key_file);
        }
        Ok(target)
    }

    /// Run `command` on the server, retrying while it is not reachable yet.
    pub fn run_command(&self, command: &str) -> Result<CommandOutput, HarnessError> {
        let target = self.remote_target()?;
        let config = self.services.config();
        let policy = RetryPolicy::new(config.remote.retry_attempts, config.remote.retry_delay());
        let shell = self.services.shell();
        run_remote_command_with_retry(
            shell.as_ref(),
            &target,
            command,
            config.timeouts.command(),
            &policy,
        )
    }

    /// Delete, then wait until the backend no longer reports it as live.
    fn delete_and_wait(&self) -> Result<(), HarnessError> {
        let session = self.actor.session(&self.services)?;
        self.services
            .backend()
            .delete_server(&session, &self.server.id)?;
        let timeouts = &self.services.config().timeouts;
        poll_until(
            &format!("server {} to be deleted", self.server.id),
            timeouts.server_delete(),
            timeouts.poll_interval(),
            || match self.services.backend().get_server(&session, &self.server.id) {
                Ok(server) if server.status == ServerStatus::Active => Ok(None),
                Ok(_) => Ok(Some(())),
                Err(e) if e.is_not_found() => Ok(Some(())),
                Err(e) => Err(e.into()),
            },
        )?;
        info!("Deleted server {}", self.server.id);
        Ok(())
    }
}
