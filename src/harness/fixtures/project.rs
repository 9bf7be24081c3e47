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

use super::{UserHandle, grant_role};
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use std::sync::Arc;
use tracing::info;

/// A fresh project. The configured admin user is given `admin` on it so
/// admin-scoped network calls work inside the project.
#[derive(Debug, Clone, Default)]
pub struct ProjectFixture {
    domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    pub id: String,
    pub name: String,
    pub domain_id: Option<String>,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_domain(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = Some(domain_id.into());
        self
    }
}

impl Fixture for ProjectFixture {
    type Handle = ProjectHandle;

    fn kind(&self) -> &'static str {
        "project"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<ProjectHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = services.admin_session()?;
        let name = services.names().make_object_name("project");
        let project =
            services
                .backend()
                .create_project(&session, &name, self.domain_id.as_deref())?;
        info!("Created project {} ({})", project.name, project.id);

        let project_id = project.id.clone();
        let cleanup_services = Arc::clone(&services);
        scenario.add_cleanup(format!("delete project {name}"), move || {
            let session = cleanup_services.admin_session()?;
            cleanup_services
                .backend()
                .delete_project(&session, &project_id)?;
            info!("Deleted project {project_id}");
            Ok(())
        });

        grant_role(scenario, "admin", &session.user_id, &project.id)?;

        Ok(ProjectHandle {
            id: project.id,
            name: project.name,
            domain_id: project.domain_id,
        })
    }
}

impl ProjectHandle {
    /// Give `user` the named role on this project until the scenario ends.
    pub fn grant_role(
        &self,
        scenario: &mut Scenario,
        user: &UserHandle,
        role_name: &str,
    ) -> Result<(), HarnessError> {
        grant_role(scenario, role_name, &user.id, &self.id)
    }
}
