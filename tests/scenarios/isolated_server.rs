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

use crate::common::test_cloud;
use cloud_harness::harness::{
    BackendError, FixtureState, HarnessError, IsolatedServerFixture, ResourceKind, Scenario,
};

const TRACKED: [ResourceKind; 11] = [
    ResourceKind::Project,
    ResourceKind::User,
    ResourceKind::RoleAssignment,
    ResourceKind::Network,
    ResourceKind::Subnet,
    ResourceKind::SecurityGroupRule,
    ResourceKind::Keypair,
    ResourceKind::Router,
    ResourceKind::Server,
    ResourceKind::FloatingIp,
    ResourceKind::SecurityGroup,
];

fn snapshot(cloud: &cloud_harness::harness::InMemoryCloud) -> Vec<(ResourceKind, usize)> {
    TRACKED.iter().map(|kind| (*kind, cloud.count_of(*kind))).collect()
}

#[test]
fn isolated_server_is_reachable_and_fully_released() {
    let env = test_cloud();
    let baseline = snapshot(&env.cloud);
    let mut scenario = Scenario::new(env.services.clone(), "isolated server");

    let isolated = scenario.use_fixture(IsolatedServerFixture).unwrap();

    assert_eq!(isolated.internal_ips, vec!["10.1.11.3".to_string()]);
    assert!(isolated.floating_ip.ip.starts_with("172.24.4."));
    assert_eq!(isolated.security_group_rules.len(), 2);
    assert_eq!(isolated.router.interfaces(), vec![isolated.network.subnet.id.clone()]);
    assert!(isolated.router.gateway().is_some());
    assert!(env.cloud.has_role_assignment("Member", &isolated.user.id, &isolated.project.id));
    let target = isolated.server.remote_target().unwrap();
    assert_eq!(target.host, isolated.floating_ip.ip);
    assert_eq!(target.user, "cirros");
    assert_eq!(target.key_file, isolated.keypair.private_key_file);
    assert_eq!(scenario.state_of("isolated_server#0"), FixtureState::Acquired);

    env.cloud.clear_calls();
    assert!(scenario.teardown().is_empty());

    let deletions: Vec<&str> = env.cloud.deletions().iter().map(|c| c.op).collect();
    assert_eq!(
        deletions,
        vec![
            "delete_floating_ip",
            "delete_server",
            "delete_router",
            "delete_keypair",
            "delete_security_group_rule",
            "delete_security_group_rule",
            "delete_subnet",
            "delete_network",
            "delete_user",
            "delete_project",
        ]
    );
    assert_eq!(snapshot(&env.cloud), baseline);
    assert_eq!(env.services.subnets().issued(), 0);
    assert!(
        scenario
            .fixture_states()
            .iter()
            .all(|(_, state)| *state == FixtureState::Released)
    );
}

#[test]
fn server_boot_failure_releases_everything_built_before_it() {
    let env = test_cloud();
    let baseline = snapshot(&env.cloud);
    env.cloud.fail_next(
        "create_server",
        BackendError::Client {
            message: "No valid host was found".to_string(),
        },
    );
    let mut scenario = Scenario::new(env.services.clone(), "boot failure");

    let err = scenario.use_fixture(IsolatedServerFixture).unwrap_err();

    assert!(matches!(
        &err,
        HarnessError::Fixture { fixture, .. } if fixture == "isolated_server#0"
    ));
    assert!(matches!(err.root(), HarnessError::Backend(BackendError::Client { .. })));
    assert_eq!(scenario.state_of("isolated_server#0"), FixtureState::Failed);
    assert!(env.cloud.count_of(ResourceKind::Router) > 0);

    assert!(scenario.teardown().is_empty());
    assert_eq!(snapshot(&env.cloud), baseline);
    assert_eq!(env.cloud.call_count("delete_server"), 0);
    assert_eq!(env.services.subnets().issued(), 0);
}

#[test]
fn floating_ip_failure_still_deletes_the_server() {
    let env = test_cloud();
    let baseline = snapshot(&env.cloud);
    env.cloud.fail_next(
        "create_floating_ip",
        BackendError::Client {
            message: "quota exceeded for floating ips".to_string(),
        },
    );

    let result = Scenario::run(env.services.clone(), "floating ip failure", |scenario| {
        scenario.use_fixture(IsolatedServerFixture).map(|_| ())
    });

    let err = result.unwrap_err();
    assert!(!err.has_teardown_failures());
    assert!(err.failure.is_some());
    assert_eq!(env.cloud.call_count("delete_server"), 1);
    assert_eq!(snapshot(&env.cloud), baseline);
}
