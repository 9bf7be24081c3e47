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
use cloud_harness::harness::backend::{Direction, Protocol, SubnetSpec};
use cloud_harness::harness::fixtures::find_network;
use cloud_harness::harness::{
    BackendError, DomainFixture, FloatingIpFixture, GroupFixture, HarnessError, KeypairFixture,
    NetworkFixture, ProjectFixture, ResourceKind, RouterFixture, Scenario,
    SecurityGroupRuleFixture, UserFixture,
};

#[test]
fn domain_is_disabled_before_it_is_deleted() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "domain");
    let domain = scenario.use_fixture(DomainFixture).unwrap();
    let group = scenario
        .use_fixture(GroupFixture::new().in_domain(&domain.id))
        .unwrap();
    assert_eq!(group.domain_id.as_deref(), Some(domain.id.as_str()));

    assert!(scenario.teardown().is_empty());
    let ops: Vec<&str> = env.cloud.calls().iter().map(|c| c.op).collect();
    let disable = ops.iter().position(|op| *op == "update_domain").unwrap();
    let delete = ops.iter().position(|op| *op == "delete_domain").unwrap();
    let group_delete = ops.iter().position(|op| *op == "delete_group").unwrap();
    assert!(group_delete < disable);
    assert!(disable < delete);
    assert_eq!(env.cloud.count_of(ResourceKind::Domain), 0);
}

#[test]
fn user_gets_a_random_password_that_authenticates() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "user");
    let user = scenario.use_fixture(UserFixture::new()).unwrap();

    assert!(user.name.starts_with("cloudharness-user-"));
    assert!(user.password.starts_with("password"));
    env.services.session(&user.credentials(), None).unwrap();
}

#[test]
fn project_grants_admin_role_to_the_admin_user() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "project");
    let project = scenario.use_fixture(ProjectFixture::new()).unwrap();
    let admin = env.services.admin_session().unwrap();

    assert!(env.cloud.has_role_assignment("admin", &admin.user_id, &project.id));
    env.services.admin_session_in(&project.name).unwrap();

    scenario.teardown();
    assert!(!env.cloud.has_role_assignment("admin", &admin.user_id, &project.id));
}

#[test]
fn network_returns_its_subnet_index_after_deletion() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "network");
    let first = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let second = scenario.use_fixture(NetworkFixture::new()).unwrap();

    assert_ne!(first.subnet_index, second.subnet_index);
    assert_ne!(first.cidr(), second.cidr());
    assert_eq!(env.services.subnets().issued(), 2);
    assert_eq!(first.network.subnet_ids, vec![first.subnet.id.clone()]);

    assert!(scenario.teardown().is_empty());
    assert_eq!(env.services.subnets().issued(), 0);
    assert_eq!(env.cloud.count_of(ResourceKind::Subnet), 0);
}

#[test]
fn failed_subnet_creation_still_deletes_network_and_returns_index() {
    let env = test_cloud();
    env.cloud.fail_next(
        "create_subnet",
        BackendError::Client {
            message: "quota exceeded".to_string(),
        },
    );
    let mut scenario = Scenario::new(env.services.clone(), "subnet failure");

    let err = scenario.use_fixture(NetworkFixture::new()).unwrap_err();
    assert!(matches!(err.root(), HarnessError::Backend(BackendError::Client { .. })));
    assert_eq!(env.services.subnets().issued(), 0);

    assert!(scenario.teardown().is_empty());
    assert_eq!(env.services.subnets().issued(), 0);
    assert_eq!(env.cloud.count_of(ResourceKind::Network), 1);
    assert_eq!(env.cloud.call_count("delete_subnet"), 0);
}

#[test]
fn subnet_that_survives_teardown_keeps_its_index() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "stuck subnet");
    let stuck = scenario.use_fixture(NetworkFixture::new()).unwrap();
    env.cloud.fail_next(
        "delete_subnet",
        BackendError::Client {
            message: "backend unavailable".to_string(),
        },
    );

    let failures = scenario.teardown();
    let steps: Vec<&str> = failures.iter().map(|f| f.step.as_str()).collect();
    assert!(steps[0].starts_with("delete subnet"));
    assert_eq!(env.cloud.count_of(ResourceKind::Subnet), 1);
    assert_eq!(env.services.subnets().issued(), 1);

    let mut next = Scenario::new(env.services.clone(), "after stuck subnet");
    let fresh = next.use_fixture(NetworkFixture::new()).unwrap();
    assert_ne!(fresh.subnet_index, stuck.subnet_index);
    assert_ne!(fresh.cidr(), stuck.cidr());
    assert!(next.teardown().is_empty());
    assert_eq!(env.services.subnets().issued(), 1);
}

#[test]
fn subnet_removed_out_of_band_still_returns_its_index() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "vanished subnet");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let session = env.services.admin_session().unwrap();
    env.services
        .backend()
        .delete_subnet(&session, &network.subnet.id)
        .unwrap();

    assert!(scenario.teardown().is_empty());
    assert_eq!(env.services.subnets().issued(), 0);
}

#[test]
fn router_detaches_everything_before_deletion() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "router");
    let a = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let b = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let router = scenario.use_fixture(RouterFixture::new()).unwrap();
    let external = find_network(&env.services, "public").unwrap();

    router.add_interface(&a.subnet.id).unwrap();
    router.add_interface(&b.subnet.id).unwrap();
    router.add_gateway(&external.id).unwrap();
    assert_eq!(router.interfaces(), vec![a.subnet.id.clone(), b.subnet.id.clone()]);

    assert!(scenario.teardown().is_empty());
    let ops: Vec<&str> = env.cloud.calls().iter().map(|c| c.op).collect();
    let router_delete = ops.iter().position(|op| *op == "delete_router").unwrap();
    let last_detach = ops
        .iter()
        .rposition(|op| *op == "remove_router_interface")
        .unwrap();
    let gateway_clear = ops.iter().position(|op| *op == "remove_router_gateway").unwrap();
    assert!(last_detach < router_delete);
    assert!(gateway_clear < router_delete);
    assert_eq!(env.cloud.count_of(ResourceKind::Router), 0);
}

#[test]
fn attaching_the_same_subnet_twice_is_rejected_by_the_backend() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "double attach");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let router = scenario.use_fixture(RouterFixture::new()).unwrap();

    router.add_interface(&network.subnet.id).unwrap();
    let err = router.add_interface(&network.subnet.id).unwrap_err();

    assert!(matches!(err, HarnessError::Backend(BackendError::Conflict { .. })));
    assert_eq!(router.interfaces().len(), 1);
    assert!(scenario.teardown().is_empty());
}

#[test]
fn failed_detach_keeps_the_interface_tracked() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "failed detach");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let router = scenario.use_fixture(RouterFixture::new()).unwrap();
    router.add_interface(&network.subnet.id).unwrap();

    env.cloud.fail_next(
        "remove_router_interface",
        BackendError::Client {
            message: "port busy".to_string(),
        },
    );
    assert!(router.remove_interface(&network.subnet.id).is_err());
    assert_eq!(router.interfaces(), vec![network.subnet.id.clone()]);

    router.remove_interface(&network.subnet.id).unwrap();
    assert!(router.interfaces().is_empty());
    assert!(scenario.teardown().is_empty());
}

#[test]
fn interface_removed_behind_the_routers_back_is_tolerated() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "independent detach");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let router = scenario.use_fixture(RouterFixture::new()).unwrap();
    router.add_interface(&network.subnet.id).unwrap();

    let session = env.services.admin_session().unwrap();
    env.services
        .backend()
        .remove_router_interface(&session, router.id(), &network.subnet.id)
        .unwrap();

    assert!(scenario.teardown().is_empty());
    assert_eq!(env.cloud.count_of(ResourceKind::Router), 0);
}

#[test]
fn detach_failure_during_teardown_leaves_router_and_reports() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "stuck router");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let router = scenario.use_fixture(RouterFixture::new()).unwrap();
    router.add_interface(&network.subnet.id).unwrap();
    env.cloud.fail_next(
        "remove_router_interface",
        BackendError::Client {
            message: "backend unavailable".to_string(),
        },
    );

    let failures = scenario.teardown();

    assert_eq!(env.cloud.call_count("delete_router"), 0);
    assert_eq!(env.cloud.count_of(ResourceKind::Router), 1);
    // The subnet cannot go while the interface is still attached.
    let steps: Vec<&str> = failures.iter().map(|f| f.step.as_str()).collect();
    assert!(steps.iter().any(|s| s.starts_with("detach and delete router")));
    assert!(steps.iter().any(|s| s.starts_with("delete subnet")));
}

#[test]
fn security_group_rules_land_on_the_default_group() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "rules");
    let project = scenario.use_fixture(ProjectFixture::new()).unwrap();
    let ssh = scenario
        .use_fixture(
            SecurityGroupRuleFixture::new(&project, Direction::Ingress, Protocol::Tcp).ports(22, 22),
        )
        .unwrap();

    assert_eq!(ssh.rule.port_range_min, Some(22));
    assert_eq!(env.cloud.count_of(ResourceKind::SecurityGroupRule), 1);
    assert!(scenario.teardown().is_empty());
    assert_eq!(env.cloud.count_of(ResourceKind::SecurityGroupRule), 0);
}

#[test]
fn security_group_rule_requires_a_project() {
    let env = test_cloud();
    let mut setup = Scenario::new(env.services.clone(), "setup");
    let project = setup.use_fixture(ProjectFixture::new()).unwrap();

    let mut scenario = Scenario::new(env.services.clone(), "orphan rule");
    let err = scenario
        .use_fixture(SecurityGroupRuleFixture::new(
            &project,
            Direction::Egress,
            Protocol::Icmp,
        ))
        .unwrap_err();
    assert!(matches!(err.root(), HarnessError::InvalidState { .. }));
}

#[test]
fn keypair_private_key_is_written_owner_only_and_removed() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "keypair");
    let keypair = scenario.use_fixture(KeypairFixture::new()).unwrap();

    let path = keypair.private_key_file.clone().unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("PRIVATE KEY"));
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    assert!(scenario.teardown().is_empty());
    assert!(!path.exists());
    assert!(!path.parent().unwrap().exists());
    assert_eq!(env.cloud.count_of(ResourceKind::Keypair), 0);
}

#[test]
fn floating_ip_comes_from_the_external_pool() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "floating ip");
    let floating_ip = scenario.use_fixture(FloatingIpFixture::new()).unwrap();

    assert_eq!(floating_ip.pool, "public");
    assert!(floating_ip.ip.starts_with("172.24.4."));
    assert!(scenario.teardown().is_empty());
    assert_eq!(env.cloud.count_of(ResourceKind::FloatingIp), 0);
}

#[test]
fn subnet_with_overlapping_cidr_is_rejected() {
    let env = test_cloud();
    let mut scenario = Scenario::new(env.services.clone(), "overlap");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();

    let session = env.services.admin_session().unwrap();
    let err = env
        .services
        .backend()
        .create_subnet(
            &session,
            &SubnetSpec {
                name: "manual".to_string(),
                network_id: network.id().to_string(),
                cidr: network.cidr().to_string(),
                ip_version: 4,
            },
        )
        .unwrap_err();
    assert!(matches!(err, BackendError::Conflict { .. }));
}
