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

//! Process-wide cache of authenticated sessions.
//!
//! Keyed by (principal, scope). The table lock is held only for the lookup
//! and the insert; authentication itself runs unlocked, so two threads
//! missing the same key both authenticate and the later insert wins. Both
//! sessions stay valid, so the race only costs an extra handshake.

use crate::harness::backend::{Authenticator, Credentials, Session};
use crate::harness::error::BackendError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

type SessionKey = (String, Option<String>);

#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached session for `(credentials.username, scope)`, or
    /// authenticate and cache a new one when absent or `force_new` is set.
    pub fn get_or_create<A>(
        &self,
        authenticator: &A,
        credentials: &Credentials,
        scope: Option<&str>,
        force_new: bool,
    ) -> Result<Session, BackendError>
    where
        A: Authenticator + ?Sized,
    {
        let key = (credentials.username.clone(), scope.map(str::to_string));
        if !force_new {
            if let Some(session) = self.lock().get(&key) {
                return Ok(session.clone());
            }
        }

        debug!(
            "Authenticating '{}' (scope: {:?}, forced: {force_new})",
            credentials.username, scope
        );
        let session = authenticator.authenticate(credentials, scope)?;
        self.lock().insert(key, session.clone());
        Ok(session)
    }

    /// Drop the cached session so the next lookup re-authenticates.
    pub fn invalidate(&self, principal: &str, scope: Option<&str>) -> bool {
        self.lock()
            .remove(&(principal.to_string(), scope.map(str::to_string)))
            .is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionKey, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
