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

use super::{Actor, ProjectHandle};
use crate::harness::backend::{
    Direction, Protocol, ResourceKind, SecurityGroupRule, SecurityGroupRuleSpec,
};
use crate::harness::error::{BackendError, HarnessError};
use crate::harness::scenario::{Fixture, Scenario};
use std::sync::Arc;
use tracing::info;

const DEFAULT_SECURITY_GROUP: &str = "default";

/// A rule on the project's `default` security group.
#[derive(Debug, Clone)]
pub struct SecurityGroupRuleFixture {
    project_id: String,
    actor: Actor,
    direction: Direction,
    protocol: Protocol,
    port_range: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupRuleHandle {
    pub rule: SecurityGroupRule,
}

impl SecurityGroupRuleFixture {
    pub fn new(project: &ProjectHandle, direction: Direction, protocol: Protocol) -> Self {
        Self {
            project_id: project.id.clone(),
            actor: Actor::AdminIn(project.name.clone()),
            direction,
            protocol,
            port_range: None,
        }
    }

    pub fn ports(mut self, min: u16, max: u16) -> Self {
        self.port_range = Some((min, max));
        self
    }
}

impl Fixture for SecurityGroupRuleFixture {
    type Handle = SecurityGroupRuleHandle;

    fn kind(&self) -> &'static str {
        "security_group_rule"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["project"]
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<SecurityGroupRuleHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = self.actor.session(&services)?;
        let group = services
            .backend()
            .list_security_groups(&session, Some(&self.project_id))?
            .into_iter()
            .find(|g| g.name == DEFAULT_SECURITY_GROUP)
            .ok_or_else(|| {
                BackendError::not_found(ResourceKind::SecurityGroup, DEFAULT_SECURITY_GROUP)
            })?;

        let spec = SecurityGroupRuleSpec {
            security_group_id: group.id,
            direction: self.direction,
            protocol: self.protocol,
            port_range_min: self.port_range.map(|(min, _)| min),
            port_range_max: self.port_range.map(|(_, max)| max),
        };
        let rule = services
            .backend()
            .create_security_group_rule(&session, &spec)?;
        info!(
            "Created security group rule {} ({} {})",
            rule.id, rule.direction, rule.protocol
        );

        let rule_id = rule.id.clone();
        let actor = self.actor;
        scenario.add_cleanup(format!("delete security group rule {rule_id}"), move || {
            let session = actor.session(&services)?;
            services
                .backend()
                .delete_security_group_rule(&session, &rule_id)?;
            info!("Deleted security group rule {rule_id}");
            Ok(())
        });

        Ok(SecurityGroupRuleHandle { rule })
    }
}
