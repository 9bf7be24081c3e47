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

//! Fixture lifecycle and polling primitives for tests that run against a
//! live cloud control plane.
//!
//! # Example
//!
//! ```ignore
//! use cloud_harness::harness::{
//!     HarnessConfig, NetworkFixture, ProjectFixture, Scenario, ServerFixture, ServerStatus,
//!     Services,
//! };
//!
//! let config = HarnessConfig::load()?;
//! let services = Services::builder(config).backend(backend).build()?;
//!
//! Scenario::run(services, "server boots", |scenario| {
//!     let project = scenario.use_fixture(ProjectFixture::new())?;
//!     let network = scenario.use_fixture(NetworkFixture::new().in_project(&project.name))?;
//!     let server = scenario.use_fixture(ServerFixture::new(&network))?;
//!     server.wait_for_status(&[ServerStatus::Active], &[ServerStatus::Error], timeout)?;
//!     Ok(())
//! })?;
//! // Server, subnet, network and project are gone here, pass or fail.
//! ```

pub mod backend;
pub mod config;
mod error;
pub mod fixtures;
mod logging;
mod names;
mod polling;
pub mod probe;
pub mod remote;
mod scenario;
mod services;
mod session;
mod subnet_pool;
pub mod sweep;

pub use backend::{
    CloudBackend, Credentials, InMemoryCloud, ResourceKind, Server, ServerStatus, Session,
};
pub use config::{ConfigError, HarnessConfig};
pub use error::{BackendError, HarnessError, ScenarioError, TeardownFailure};
pub use fixtures::{
    DomainFixture, FloatingIpFixture, GroupFixture, IsolatedServerFixture, KeypairFixture,
    NetworkFixture, ProjectFixture, RouterFixture, SecurityGroupRuleFixture, ServerFixture,
    UserFixture,
};
pub use logging::init_tracing;
pub use names::{NameFactory, OBJECT_NAME_PREFIX, is_harness_name};
pub use polling::{RetryPolicy, poll_until, retry, wait_until};
pub use probe::{BackgroundPing, PingSummary, parse_ping_summary, start_background_ping};
pub use remote::{
    CommandOutput, RemoteProcess, RemoteShell, RemoteTarget, SshShell,
    is_transient_connection_error, run_remote_command, run_remote_command_with_retry,
};
pub use scenario::{Fixture, FixtureState, Scenario};
pub use services::{Services, ServicesBuilder};
pub use session::SessionCache;
pub use subnet_pool::SubnetPool;
pub use sweep::{LeakReport, LeakSweeper, SweepOutcome};
