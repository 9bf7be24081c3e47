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

//! Finding and deleting resources leaked by earlier runs.
//!
//! Everything the fixtures create is named `cloudharness-<kind>-...`, so
//! anything matching that pattern and still present outside a running
//! scenario is a leak.

use crate::harness::backend::{Network, Project, Router, Session, Subnet, User};
use crate::harness::error::{BackendError, HarnessError};
use crate::harness::names::OBJECT_NAME_PREFIX;
use crate::harness::services::Services;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakReport {
    pub routers: Vec<Router>,
    pub networks: Vec<(Network, Vec<Subnet>)>,
    pub users: Vec<User>,
    pub projects: Vec<Project>,
}

impl LeakReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.routers.len()
            + self
                .networks
                .iter()
                .map(|(_, subnets)| 1 + subnets.len())
                .sum::<usize>()
            + self.users.len()
            + self.projects.len()
    }
}

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub deleted: usize,
    /// What could not be deleted, and why.
    pub failures: Vec<(String, HarnessError)>,
}

impl SweepOutcome {
    fn record(&mut self, what: String, result: Result<(), BackendError>) {
        match result {
            Ok(()) => {
                info!("Swept {what}");
                self.deleted += 1;
            }
            Err(e) if e.is_not_found() => warn!("{what} was already gone"),
            Err(e) => {
                warn!("Failed to sweep {what}: {e}");
                self.failures.push((what, e.into()));
            }
        }
    }
}

pub struct LeakSweeper {
    services: Arc<Services>,
    pattern: Regex,
}

impl LeakSweeper {
    pub fn new(services: Arc<Services>) -> Result<Self, HarnessError> {
        let pattern = Regex::new(&format!("^{}", regex::escape(OBJECT_NAME_PREFIX)))
            .map_err(|e| HarnessError::invalid_state(format!("bad leak pattern: {e}")))?;
        Ok(Self { services, pattern })
    }

    pub fn with_pattern(services: Arc<Services>, pattern: Regex) -> Self {
        Self { services, pattern }
    }

    pub fn find_leaks(&self) -> Result<LeakReport, HarnessError> {
        let session = self.services.admin_session()?;
        let backend = self.services.backend();
        let matches = |name: &str| self.pattern.is_match(name);

        let routers = backend
            .list_routers(&session)?
            .into_iter()
            .filter(|r| matches(&r.name))
            .collect();

        let mut networks = Vec::new();
        for network in backend.list_networks(&session)? {
            if network.external || !matches(&network.name) {
                continue;
            }
            let subnets = backend.list_subnets(&session, Some(&network.id))?;
            networks.push((network, subnets));
        }

        let users = backend
            .list_users(&session)?
            .into_iter()
            .filter(|u| matches(&u.name))
            .collect();
        let projects = backend
            .list_projects(&session)?
            .into_iter()
            .filter(|p| matches(&p.name))
            .collect();

        let report = LeakReport {
            routers,
            networks,
            users,
            projects,
        };
        info!("Found {} leaked resource(s)", report.total());
        Ok(report)
    }

    /// Delete everything in `report`, dependents first. Keeps going past
    /// failures and returns them all.
    pub fn sweep(&self, report: LeakReport) -> Result<SweepOutcome, HarnessError> {
        let session = self.services.admin_session()?;
        let mut outcome = SweepOutcome::default();

        for router in &report.routers {
            self.sweep_router(&session, router, &mut outcome);
        }
        for (network, subnets) in &report.networks {
            for subnet in subnets {
                outcome.record(
                    format!("subnet {}", subnet.name),
                    self.services.backend().delete_subnet(&session, &subnet.id),
                );
            }
            outcome.record(
                format!("network {}", network.name),
                self.services.backend().delete_network(&session, &network.id),
            );
        }
        for user in &report.users {
            outcome.record(
                format!("user {}", user.name),
                self.services.backend().delete_user(&session, &user.id),
            );
        }
        for project in &report.projects {
            outcome.record(
                format!("project {}", project.name),
                self.services.backend().delete_project(&session, &project.id),
            );
        }
        Ok(outcome)
    }

    fn sweep_router(&self, session: &Session, router: &Router, outcome: &mut SweepOutcome) {
        let backend = self.services.backend();
        if router.gateway_network_id.is_some() {
            if let Err(e) = backend.remove_router_gateway(session, &router.id) {
                if !e.is_not_found() {
                    outcome
                        .failures
                        .push((format!("gateway of router {}", router.name), e.into()));
                }
            }
        }
        for subnet_id in &router.interfaces {
            if let Err(e) = backend.remove_router_interface(session, &router.id, subnet_id) {
                if !e.is_not_found() {
                    outcome.failures.push((
                        format!("interface {subnet_id} of router {}", router.name),
                        e.into(),
                    ));
                }
            }
        }
        outcome.record(
            format!("router {}", router.name),
            backend.delete_router(session, &router.id),
        );
    }
}
