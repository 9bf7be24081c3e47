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

use crate::harness::backend::{ResourceKind, ServerStatus};
use crate::harness::config::ConfigError;
use std::fmt::{Display, Formatter};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the cloud services themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },
    #[error("Conflict on {kind}: {message}")]
    Conflict { kind: ResourceKind, message: String },
    #[error("Authentication failed for '{principal}'")]
    Unauthorized { principal: String },
    #[error("Backend rejected request: {message}")]
    Client { message: String },
}

impl BackendError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        BackendError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(kind: ResourceKind, message: impl Into<String>) -> Self {
        BackendError::Conflict {
            kind,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
    #[error("Server '{server}' reached failure status {status}")]
    ServerStatus { server: String, status: ServerStatus },
    #[error("Subnet pool {first}..={last} is exhausted")]
    ExhaustedPool { first: u16, last: u16 },
    #[error("Subnet index {index} is not currently issued")]
    SubnetNotIssued { index: u16 },
    #[error("Command '{command}' on {host} did not finish within {timeout:?}")]
    CommandTimeout {
        host: String,
        command: String,
        timeout: Duration,
    },
    #[error("Cannot parse probe output: {output:?}")]
    UnparseableProbeOutput { output: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Fixture {fixture} failed: {source}")]
    Fixture {
        fixture: String,
        #[source]
        source: Box<HarnessError>,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl HarnessError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        HarnessError::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        HarnessError::InvalidState {
            message: message.into(),
        }
    }

    /// True when the root cause is a backend "not found".
    pub fn is_not_found(&self) -> bool {
        match self {
            HarnessError::Backend(e) => e.is_not_found(),
            HarnessError::Fixture { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The error with all fixture context peeled off.
    pub fn root(&self) -> &HarnessError {
        match self {
            HarnessError::Fixture { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A cleanup that failed while a scenario was being torn down.
#[derive(Debug)]
pub struct TeardownFailure {
    pub fixture: Option<String>,
    pub step: String,
    pub error: HarnessError,
}

impl Display for TeardownFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.fixture {
            Some(fixture) => write!(f, "[{fixture}] {}: {}", self.step, self.error),
            None => write!(f, "{}: {}", self.step, self.error),
        }
    }
}

/// Outcome of a scenario that failed, failed to tear down, or both.
///
/// The original failure always comes first; teardown failures never replace it.
#[derive(Debug)]
pub struct ScenarioError {
    pub scenario: String,
    pub failure: Option<HarnessError>,
    pub teardown: Vec<TeardownFailure>,
}

impl ScenarioError {
    pub fn has_teardown_failures(&self) -> bool {
        !self.teardown.is_empty()
    }
}

impl Display for ScenarioError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.failure {
            Some(failure) => write!(f, "Scenario '{}' failed: {failure}", self.scenario)?,
            None => write!(f, "Scenario '{}' passed", self.scenario)?,
        }
        if !self.teardown.is_empty() {
            write!(
                f,
                "\n=== {} TEARDOWN FAILURE(S) ===",
                self.teardown.len()
            )?;
            for failure in &self.teardown {
                write!(f, "\n{failure}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failure
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
