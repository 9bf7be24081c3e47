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

use super::Actor;
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use std::sync::Arc;
use tracing::info;

/// A floating IP from an external pool, by default the configured
/// external network.
#[derive(Debug, Clone, Default)]
pub struct FloatingIpFixture {
    pool: Option<String>,
    actor: Actor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingIpHandle {
    pub id: String,
    pub ip: String,
    pub pool: String,
}

impl FloatingIpFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    pub(crate) fn acting_as(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }
}

impl Fixture for FloatingIpFixture {
    type Handle = FloatingIpHandle;

    fn kind(&self) -> &'static str {
        "floating_ip"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<FloatingIpHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = self.actor.session(&services)?;
        let pool = self
            .pool
            .unwrap_or_else(|| services.config().network.external_network.clone());
        let floating_ip = services.backend().create_floating_ip(&session, &pool)?;
        info!("Created floating IP {} from {pool}", floating_ip.ip);

        let floating_ip_id = floating_ip.id.clone();
        let actor = self.actor;
        scenario.add_cleanup(format!("delete floating IP {}", floating_ip.ip), move || {
            let session = actor.session(&services)?;
            services
                .backend()
                .delete_floating_ip(&session, &floating_ip_id)?;
            info!("Deleted floating IP {floating_ip_id}");
            Ok(())
        });

        Ok(FloatingIpHandle {
            id: floating_ip.id,
            ip: floating_ip.ip,
            pool,
        })
    }
}
