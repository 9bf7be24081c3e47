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

//! Fixture lifecycle and the per-scenario cleanup stack.
//!
//! A [`Scenario`] owns one stack of cleanups. Fixtures push onto it while
//! they acquire, so a child acquired inside its parent's acquisition is
//! always released before the parent. Teardown pops the stack to the
//! bottom no matter how the scenario ended, and a failed cleanup never
//! stops the ones below it.
//!
//! Each fixture instance moves through
//! `Unacquired -> Acquiring -> Acquired -> Releasing -> Released`, or from
//! `Acquiring` to `Failed`. Cleanups a failed acquisition already
//! registered still run.

use crate::harness::error::{HarnessError, ScenarioError, TeardownFailure};
use crate::harness::services::Services;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use strum::Display;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Something a scenario can provision and later release.
pub trait Fixture {
    type Handle;

    /// Short name used in logs and failure reports.
    fn kind(&self) -> &'static str;

    /// Kinds that must already be acquired in the same scenario.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Create the resource, registering cleanups on `scenario` as each
    /// piece comes into existence.
    fn acquire(self, scenario: &mut Scenario) -> Result<Self::Handle, HarnessError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FixtureState {
    Unacquired,
    Acquiring,
    Acquired,
    Releasing,
    Released,
    Failed,
}

type CleanupFn = Box<dyn FnOnce() -> Result<(), HarnessError> + Send>;

struct CleanupEntry {
    step: String,
    owner: Option<usize>,
    action: CleanupFn,
}

#[derive(Debug)]
struct FixtureRecord {
    kind: &'static str,
    label: String,
    state: FixtureState,
    pending_cleanups: usize,
}

pub struct Scenario {
    name: String,
    run_id: Uuid,
    services: Arc<Services>,
    cleanups: Vec<CleanupEntry>,
    fixtures: Vec<FixtureRecord>,
    acquiring: Vec<usize>,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .field("fixtures", &self.fixtures)
            .field("pending_cleanups", &self.cleanups.len())
            .finish()
    }
}

impl Scenario {
    pub fn new(services: Arc<Services>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_id: Uuid::now_v7(),
            services,
            cleanups: Vec::new(),
            fixtures: Vec::new(),
            acquiring: Vec::new(),
        }
    }

    /// Run `body` in a fresh scenario and tear everything down afterwards.
    ///
    /// A panic in `body` is resumed after teardown has finished.
    pub fn run<T, F>(services: Arc<Services>, name: &str, body: F) -> Result<T, ScenarioError>
    where
        F: FnOnce(&mut Scenario) -> Result<T, HarnessError>,
    {
        let mut scenario = Scenario::new(services, name);
        info!("Starting scenario '{name}' ({})", scenario.run_id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut scenario)));
        let teardown = scenario.teardown();

        match outcome {
            Ok(Ok(value)) if teardown.is_empty() => {
                info!("Scenario '{name}' passed");
                Ok(value)
            }
            Ok(Ok(_)) => Err(ScenarioError {
                scenario: name.to_string(),
                failure: None,
                teardown,
            }),
            Ok(Err(failure)) => {
                error!("Scenario '{name}' failed: {failure}");
                Err(ScenarioError {
                    scenario: name.to_string(),
                    failure: Some(failure),
                    teardown,
                })
            }
            Err(panic) => {
                for failure in &teardown {
                    error!("Teardown failure after panic in '{name}': {failure}");
                }
                panic::resume_unwind(panic)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Acquire `fixture`, tagging every cleanup it registers with it.
    pub fn use_fixture<F: Fixture>(&mut self, fixture: F) -> Result<F::Handle, HarnessError> {
        let kind = fixture.kind();
        let index = self.fixtures.len();
        let label = format!("{kind}#{index}");

        for dependency in fixture.dependencies() {
            let satisfied = self
                .fixtures
                .iter()
                .any(|f| f.kind == dependency && f.state == FixtureState::Acquired);
            if !satisfied {
                return Err(HarnessError::Fixture {
                    fixture: label,
                    source: Box::new(HarnessError::invalid_state(format!(
                        "{kind} requires an acquired {dependency}"
                    ))),
                });
            }
        }

        self.fixtures.push(FixtureRecord {
            kind,
            label: label.clone(),
            state: FixtureState::Acquiring,
            pending_cleanups: 0,
        });
        self.acquiring.push(index);
        info!("Acquiring {label}");
        let result = fixture.acquire(self);
        self.acquiring.pop();

        match result {
            Ok(handle) => {
                self.fixtures[index].state = FixtureState::Acquired;
                info!("Acquired {label}");
                Ok(handle)
            }
            Err(source) => {
                self.fixtures[index].state = FixtureState::Failed;
                error!("Failed to acquire {label}: {source}");
                Err(HarnessError::Fixture {
                    fixture: label,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Push a cleanup, owned by the fixture currently being acquired if any.
    pub fn add_cleanup<F>(&mut self, step: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<(), HarnessError> + Send + 'static,
    {
        let owner = self.acquiring.last().copied();
        if let Some(owner) = owner {
            self.fixtures[owner].pending_cleanups += 1;
        }
        self.cleanups.push(CleanupEntry {
            step: step.into(),
            owner,
            action: Box::new(action),
        });
    }

    /// Run every registered cleanup, newest first.
    ///
    /// Returns the cleanups that failed. Calling it again is a no-op.
    pub fn teardown(&mut self) -> Vec<TeardownFailure> {
        if self.cleanups.is_empty() {
            self.release_settled();
            return Vec::new();
        }
        info!(
            "Tearing down scenario '{}': {} cleanup(s)",
            self.name,
            self.cleanups.len()
        );

        let mut failures = Vec::new();
        while let Some(entry) = self.cleanups.pop() {
            let fixture = entry.owner.map(|owner| {
                let record = &mut self.fixtures[owner];
                if record.state != FixtureState::Failed {
                    record.state = FixtureState::Releasing;
                }
                record.label.clone()
            });

            let result = match panic::catch_unwind(AssertUnwindSafe(entry.action)) {
                Ok(result) => result,
                Err(panic) => Err(HarnessError::invalid_state(format!(
                    "cleanup panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };

            if let Some(owner) = entry.owner {
                let record = &mut self.fixtures[owner];
                record.pending_cleanups = record.pending_cleanups.saturating_sub(1);
                if result.is_err() {
                    record.state = FixtureState::Failed;
                } else if record.pending_cleanups == 0 && record.state == FixtureState::Releasing {
                    record.state = FixtureState::Released;
                }
            }

            if let Err(error) = result {
                error!("Cleanup '{}' failed: {error}", entry.step);
                failures.push(TeardownFailure {
                    fixture,
                    step: entry.step,
                    error,
                });
            }
        }
        self.release_settled();
        failures
    }

    /// Fixtures that registered no cleanups of their own (composites whose
    /// children own everything) are released once the stack is empty.
    fn release_settled(&mut self) {
        for record in &mut self.fixtures {
            if record.state == FixtureState::Acquired && record.pending_cleanups == 0 {
                record.state = FixtureState::Released;
            }
        }
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }

    /// Labels (`kind#n`) and states of every fixture used so far.
    pub fn fixture_states(&self) -> Vec<(String, FixtureState)> {
        self.fixtures
            .iter()
            .map(|f| (f.label.clone(), f.state))
            .collect()
    }

    pub fn state_of(&self, label: &str) -> FixtureState {
        self.fixtures
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.state)
            .unwrap_or(FixtureState::Unacquired)
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        if self.cleanups.is_empty() {
            return;
        }
        warn!(
            "Scenario '{}' dropped with {} pending cleanup(s), tearing down",
            self.name,
            self.cleanups.len()
        );
        for failure in self.teardown() {
            error!("Teardown failure in '{}': {failure}", self.name);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
