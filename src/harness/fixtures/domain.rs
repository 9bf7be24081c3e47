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

/// A fresh identity domain. Domains must be disabled before they can be
/// deleted, so teardown does both.
#[derive(Debug, Clone, Default)]
pub struct DomainFixture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainHandle {
    pub id: String,
    pub name: String,
}

impl Fixture for DomainFixture {
    type Handle = DomainHandle;

    fn kind(&self) -> &'static str {
        "domain"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<DomainHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = services.admin_session()?;
        let name = services.names().make_object_name("domain");
        let domain = services.backend().create_domain(&session, &name)?;
        info!("Created domain {} ({})", domain.name, domain.id);

        let domain_id = domain.id.clone();
        scenario.add_cleanup(format!("disable and delete domain {name}"), move || {
            let session = services.admin_session()?;
            services
                .backend()
                .set_domain_enabled(&session, &domain_id, false)?;
            services.backend().delete_domain(&session, &domain_id)?;
            info!("Deleted domain {domain_id}");
            Ok(())
        });

        Ok(DomainHandle {
            id: domain.id,
            name: domain.name,
        })
    }
}
