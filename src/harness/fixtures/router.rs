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
use crate::harness::backend::Router;
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use crate::harness::services::Services;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

/// A router whose attachments are tracked so teardown can detach them.
#[derive(Debug, Clone, Default)]
pub struct RouterFixture {
    actor: Actor,
}

#[derive(Debug, Default)]
struct Attachments {
    /// Subnet ids, in attach order.
    interfaces: Vec<String>,
    gateway: Option<String>,
}

/// Cheap to clone; clones share the attachment tracking.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    pub router: Router,
    services: Arc<Services>,
    actor: Actor,
    attachments: Arc<Mutex<Attachments>>,
}

impl RouterFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_project(mut self, project_name: impl Into<String>) -> Self {
        self.actor = Actor::AdminIn(project_name.into());
        self
    }
}

impl Fixture for RouterFixture {
    type Handle = RouterHandle;

    fn kind(&self) -> &'static str {
        "router"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<RouterHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = self.actor.session(&services)?;
        let name = services.names().make_object_name("router");
        let router = services.backend().create_router(&session, &name)?;
        info!("Created router {} ({})", router.name, router.id);

        let handle = RouterHandle {
            router,
            services,
            actor: self.actor,
            attachments: Arc::new(Mutex::new(Attachments::default())),
        };
        let teardown = handle.clone();
        scenario.add_cleanup(format!("detach and delete router {name}"), move || {
            teardown.detach_all_and_delete()
        });
        Ok(handle)
    }
}

impl RouterHandle {
    pub fn id(&self) -> &str {
        &self.router.id
    }

    /// Attach `subnet_id`. Attaching the same subnet twice is left to the
    /// backend to reject.
    pub fn add_interface(&self, subnet_id: &str) -> Result<(), HarnessError> {
        let session = self.actor.session(&self.services)?;
        self.services
            .backend()
            .add_router_interface(&session, &self.router.id, subnet_id)?;
        self.attachments().interfaces.push(subnet_id.to_string());
        info!("Attached subnet {subnet_id} to router {}", self.router.id);
        Ok(())
    }

    /// Detach `subnet_id`; it stays tracked if the backend call fails.
    pub fn remove_interface(&self, subnet_id: &str) -> Result<(), HarnessError> {
        let session = self.actor.session(&self.services)?;
        self.services
            .backend()
            .remove_router_interface(&session, &self.router.id, subnet_id)?;
        self.attachments().interfaces.retain(|s| s != subnet_id);
        info!("Detached subnet {subnet_id} from router {}", self.router.id);
        Ok(())
    }

    pub fn add_gateway(&self, network_id: &str) -> Result<(), HarnessError> {
        let session = self.actor.session(&self.services)?;
        self.services
            .backend()
            .add_router_gateway(&session, &self.router.id, network_id)?;
        self.attachments().gateway = Some(network_id.to_string());
        info!("Set gateway {network_id} on router {}", self.router.id);
        Ok(())
    }

    pub fn remove_gateway(&self) -> Result<(), HarnessError> {
        let session = self.actor.session(&self.services)?;
        self.services
            .backend()
            .remove_router_gateway(&session, &self.router.id)?;
        self.attachments().gateway = None;
        info!("Cleared gateway on router {}", self.router.id);
        Ok(())
    }

    pub fn interfaces(&self) -> Vec<String> {
        self.attachments().interfaces.clone()
    }

    pub fn gateway(&self) -> Option<String> {
        self.attachments().gateway.clone()
    }

    /// Detach everything still tracked, newest first, then delete the
    /// router. Attachments the backend already dropped are skipped; any
    /// other detach failure leaves the router in place and is returned.
    fn detach_all_and_delete(&self) -> Result<(), HarnessError> {
        let session = self.actor.session(&self.services)?;
        let backend = self.services.backend();
        let mut first_error = None;

        let (interfaces, gateway) = {
            let attachments = self.attachments();
            (attachments.interfaces.clone(), attachments.gateway.clone())
        };

        if gateway.is_some() {
            match tolerate_not_found(
                backend.remove_router_gateway(&session, &self.router.id),
                "router gateway",
            ) {
                Ok(()) => self.attachments().gateway = None,
                Err(e) => {
                    error!("Failed to clear gateway on router {}: {e}", self.router.id);
                    first_error.get_or_insert(e);
                }
            }
        }

        for subnet_id in interfaces.iter().rev() {
            match tolerate_not_found(
                backend.remove_router_interface(&session, &self.router.id, subnet_id),
                "router interface",
            ) {
                Ok(()) => self.attachments().interfaces.retain(|s| s != subnet_id),
                Err(e) => {
                    error!(
                        "Failed to detach subnet {subnet_id} from router {}: {e}",
                        self.router.id
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        backend.delete_router(&session, &self.router.id)?;
        info!("Deleted router {}", self.router.id);
        Ok(())
    }

    fn attachments(&self) -> MutexGuard<'_, Attachments> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
