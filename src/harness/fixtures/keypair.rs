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

use super::{Actor, ProjectHandle, UserHandle};
use crate::harness::error::HarnessError;
use crate::harness::scenario::{Fixture, Scenario};
use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const PRIVATE_KEY_FILE: &str = "id_rsa";

/// A backend-generated keypair. The private key is written to a `0600`
/// file in a temporary directory that lives until teardown.
#[derive(Debug, Clone, Default)]
pub struct KeypairFixture {
    actor: Actor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypairHandle {
    pub name: String,
    pub public_key: String,
    pub private_key_file: Option<PathBuf>,
}

impl KeypairFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(mut self, user: &UserHandle, project: &ProjectHandle) -> Self {
        self.actor = Actor::User {
            credentials: user.credentials(),
            project: project.name.clone(),
        };
        self
    }
}

impl Fixture for KeypairFixture {
    type Handle = KeypairHandle;

    fn kind(&self) -> &'static str {
        "keypair"
    }

    fn acquire(self, scenario: &mut Scenario) -> Result<KeypairHandle, HarnessError> {
        let services = Arc::clone(scenario.services());
        let session = self.actor.session(&services)?;
        let name = services.names().make_object_name("keypair");
        let keypair = services.backend().create_keypair(&session, &name)?;
        info!("Created keypair {name}");

        let key_name = name.clone();
        let actor = self.actor;
        scenario.add_cleanup(format!("delete keypair {name}"), move || {
            let session = actor.session(&services)?;
            services.backend().delete_keypair(&session, &key_name)?;
            info!("Deleted keypair {key_name}");
            Ok(())
        });

        let private_key_file = match &keypair.private_key {
            Some(private_key) => {
                let dir = tempfile::Builder::new()
                    .prefix("cloud-harness-key-")
                    .tempdir()?;
                let path = dir.path().join(PRIVATE_KEY_FILE);
                let mut options = OpenOptions::new();
                options.write(true).create_new(true);
                #[cfg(unix)]
                options.mode(0o600);
                options.open(&path)?.write_all(private_key.as_bytes())?;

                scenario.add_cleanup(
                    format!("remove key directory {}", dir.path().display()),
                    move || Ok(dir.close()?),
                );
                Some(path)
            }
            None => None,
        };

        Ok(KeypairHandle {
            name,
            public_key: keypair.public_key,
            private_key_file,
        })
    }
}
