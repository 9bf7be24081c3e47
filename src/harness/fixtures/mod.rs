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

//! Cloud resource fixtures.
//!
//! Each fixture is a small builder. Acquiring it through
//! [`Scenario::use_fixture`] creates the resource and registers its
//! deletion, returning a handle with the backend ids and query helpers.

mod domain;
mod floating_ip;
mod group;
mod isolated_server;
mod keypair;
mod network;
mod project;
mod router;
mod security_group_rule;
mod server;
mod user;

pub use domain::{DomainFixture, DomainHandle};
pub use floating_ip::{FloatingIpFixture, FloatingIpHandle};
pub use group::{GroupFixture, GroupHandle};
pub use isolated_server::{IsolatedServerFixture, IsolatedServerHandle};
pub use keypair::{KeypairFixture, KeypairHandle};
pub use network::{NetworkFixture, NetworkHandle, find_network};
pub use project::{ProjectFixture, ProjectHandle};
pub use router::{RouterFixture, RouterHandle};
pub use security_group_rule::{SecurityGroupRuleFixture, SecurityGroupRuleHandle};
pub use server::{ServerFixture, ServerHandle};
pub use user::{UserFixture, UserHandle};

use crate::harness::backend::{Credentials, Session};
use crate::harness::error::{BackendError, HarnessError};
use crate::harness::scenario::Scenario;
use crate::harness::services::Services;
use std::sync::Arc;
use tracing::{info, warn};

/// Identity a fixture acts as: the admin, optionally scoped to a project,
/// or a tenant user scoped to its project.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum Actor {
    #[default]
    Admin,
    AdminIn(String),
    User {
        credentials: Credentials,
        project: String,
    },
}

impl Actor {
    pub(crate) fn session(&self, services: &Services) -> Result<Session, HarnessError> {
        match self {
            Actor::Admin => services.admin_session(),
            Actor::AdminIn(project) => services.admin_session_in(project),
            Actor::User {
                credentials,
                project,
            } => services.session(credentials, Some(project)),
        }
    }
}

/// Treat "already gone" as success for relations that may be removed
/// independently (role grants, router interfaces).
pub(crate) fn tolerate_not_found(
    result: Result<(), BackendError>,
    what: &str,
) -> Result<(), HarnessError> {
    match result {
        Err(e) if e.is_not_found() => {
            warn!("{what} was already gone: {e}");
            Ok(())
        }
        other => Ok(other?),
    }
}

/// Grant `role_name` to a user on a project and register the revoke.
pub(crate) fn grant_role(
    scenario: &mut Scenario,
    role_name: &str,
    user_id: &str,
    project_id: &str,
) -> Result<(), HarnessError> {
    let services = Arc::clone(scenario.services());
    let session = services.admin_session()?;
    let role = services.backend().find_role(&session, role_name)?;
    services
        .backend()
        .grant_role(&session, &role.id, user_id, project_id)?;
    info!("Granted role {role_name} to user {user_id} on project {project_id}");

    let (user_id, project_id) = (user_id.to_string(), project_id.to_string());
    scenario.add_cleanup(
        format!("revoke role {role_name} from {user_id} on {project_id}"),
        move || {
            let session = services.admin_session()?;
            tolerate_not_found(
                services
                    .backend()
                    .revoke_role(&session, &role.id, &user_id, &project_id),
                "role assignment",
            )
        },
    );
    Ok(())
}
