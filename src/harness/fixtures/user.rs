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

use crate::harness::backend::Credentials;
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct UserFixture {
    domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHandle {
    pub id: String,
    pub name: String,
    pub password: String,
    pub domain_id: Option<String>,
}

impl UserHandle {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.name, &self.password)
    }
}

impl UserFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_domain(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = Some(domain_id.into());
        self
    }
}

impl Fixture for UserFixture {
    type Handle = UserHandle;

    fn kind(&self) -> &'static str {
        "user"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<UserHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = services.admin_session()?;
        let name = services.names().make_object_name("user");
        let password = services.names().make_password();
        let user = services.backend().create_user(
            &session,
            &name,
            &password,
            self.domain_id.as_deref(),
        )?;
        info!("Created user {} ({})", user.name, user.id);

        let user_id = user.id.clone();
        scenario.add_cleanup(format!("delete user {name}"), move || {
            let session = services.admin_session()?;
            services.backend().delete_user(&session, &user_id)?;
            info!("Deleted user {user_id}");
            Ok(())
        });

        Ok(UserHandle {
            id: user.id,
            name: user.name,
            password,
            domain_id: user.domain_id,
        })
    }
}
