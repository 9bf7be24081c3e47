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

use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct GroupFixture {
    domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHandle {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
}

impl GroupFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_domain(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = Some(domain_id.into());
        self
    }
}

impl Fixture for GroupFixture {
    type Handle = GroupHandle;

    fn kind(&self) -> &'static str {
        "group"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<GroupHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = services.admin_session()?;
        let name = services.names().make_object_name("group");
        let group =
            services
                .backend()
                .create_group(&session, &name, self.domain_id.as_deref())?;
        info!("Created group {} ({})", group.name, group.id);

        let group_id = group.id.clone();
        scenario.add_cleanup(format!("delete group {name}"), move || {
            let session = services.admin_session()?;
            services.backend().delete_group(&session, &group_id)?;
            info!("Deleted group {group_id}");
            Ok(())
        });

        Ok(GroupHandle {
            id: group.id,
            name: group.name,
            domain_id: group.domain_id,
        })
    }
}
