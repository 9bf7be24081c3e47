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

//! Process-scoped services shared by every scenario.
//!
//! One [`Services`] is built per process (or per test) and handed to
//! scenarios as `Arc<Services>`. The session cache and the subnet pool live
//! here instead of in globals, so their lifetime is explicit.

use crate::harness::backend::{CloudBackend, Credentials, Session};
use crate::harness::config::HarnessConfig;
use crate::harness::error::HarnessError;
use crate::harness::names::NameFactory;
use crate::harness::remote::{RemoteShell, SshShell};
use crate::harness::session::SessionCache;
use crate::harness::subnet_pool::SubnetPool;
use std::sync::Arc;

pub struct Services {
    config: HarnessConfig,
    backend: Arc<dyn CloudBackend>,
    sessions: SessionCache,
    subnets: SubnetPool,
    names: NameFactory,
    shell: Arc<dyn RemoteShell>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.config.to_string())
            .field("sessions", &self.sessions.len())
            .field("subnets_available", &self.subnets.available())
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn builder(config: HarnessConfig) -> ServicesBuilder {
        ServicesBuilder {
            config,
            backend: None,
            shell: None,
            names: None,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn CloudBackend {
        self.backend.as_ref()
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn subnets(&self) -> &SubnetPool {
        &self.subnets
    }

    pub fn names(&self) -> &NameFactory {
        &self.names
    }

    pub fn shell(&self) -> Arc<dyn RemoteShell> {
        Arc::clone(&self.shell)
    }

    /// Admin session scoped to the configured admin project.
    pub fn admin_session(&self) -> Result<Session, HarnessError> {
        let project = self.config.admin_project.clone();
        self.session(&self.config.admin_credentials(), Some(&project))
    }

    /// Admin session scoped to another project the admin holds a role on.
    pub fn admin_session_in(&self, project_name: &str) -> Result<Session, HarnessError> {
        self.session(&self.config.admin_credentials(), Some(project_name))
    }

    pub fn session(
        &self,
        credentials: &Credentials,
        scope: Option<&str>,
    ) -> Result<Session, HarnessError> {
        Ok(self
            .sessions
            .get_or_create(self.backend.as_ref(), credentials, scope, false)?)
    }

    /// Re-authenticate, replacing whatever the cache held.
    pub fn refresh_session(
        &self,
        credentials: &Credentials,
        scope: Option<&str>,
    ) -> Result<Session, HarnessError> {
        Ok(self
            .sessions
            .get_or_create(self.backend.as_ref(), credentials, scope, true)?)
    }
}

pub struct ServicesBuilder {
    config: HarnessConfig,
    backend: Option<Arc<dyn CloudBackend>>,
    shell: Option<Arc<dyn RemoteShell>>,
    names: Option<NameFactory>,
}

impl ServicesBuilder {
    pub fn backend(mut self, backend: Arc<dyn CloudBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Defaults to [`SshShell`].
    pub fn shell(mut self, shell: Arc<dyn RemoteShell>) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn names(mut self, names: NameFactory) -> Self {
        self.names = Some(names);
        self
    }

    pub fn build(self) -> Result<Arc<Services>, HarnessError> {
        self.config.validate()?;
        let backend = self
            .backend
            .ok_or_else(|| HarnessError::invalid_state("No cloud backend configured"))?;
        let subnets = SubnetPool::new(self.config.network.subnet_range);
        Ok(Arc::new(Services {
            config: self.config,
            backend,
            sessions: SessionCache::new(),
            subnets,
            names: self.names.unwrap_or_default(),
            shell: self.shell.unwrap_or_else(|| Arc::new(SshShell::default())),
        }))
    }
}
