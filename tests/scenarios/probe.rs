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

use crate::common::{ScriptedShell, test_cloud};
use cloud_harness::harness::{
    HarnessError, NetworkFixture, RemoteShell, RemoteTarget, Scenario, ServerFixture,
    start_background_ping,
};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);
const SUMMARY: &str = "--- 10.1.12.3 ping statistics ---\n\
                       37 packets transmitted, 37 received, 0% packet loss, time 36044ms";

fn target() -> RemoteTarget {
    RemoteTarget::new("10.1.11.3", "cirros")
}

fn log_path(command: &str) -> String {
    command
        .split_whitespace()
        .find(|word| word.starts_with("/tmp/cloud-harness-ping-"))
        .unwrap()
        .to_string()
}

#[test]
fn probe_reports_the_summary_of_its_own_log() {
    let shell = Arc::new(ScriptedShell::new());
    shell.respond("nohup ping", "4242", "", 0);
    shell.respond("kill -INT 4242", SUMMARY, "", 0);

    let ping = start_background_ping(shell.clone(), &target(), "10.1.12.3", TIMEOUT).unwrap();
    assert_eq!(ping.pid(), 4242);
    assert_eq!(ping.destination(), "10.1.12.3");

    let summary = ping.stop(TIMEOUT).unwrap();
    assert_eq!(summary.packets_transmitted, 37);
    assert_eq!(summary.packet_loss_percent, 0.0);

    let executed = shell.executed();
    assert_eq!(executed.len(), 2);
    let (start, stop) = (&executed[0].1, &executed[1].1);
    assert!(start.contains("ping -q 10.1.12.3"));
    let log = log_path(start);
    assert!(stop.contains(&format!("cat {log}")));
    assert!(stop.contains(&format!("rm -f {log}")));
}

#[test]
fn destination_with_shell_syntax_never_reaches_the_guest() {
    let shell = Arc::new(ScriptedShell::new());
    shell.respond("nohup ping", "4242", "", 0);

    for destination in ["10.1.12.3; reboot", "$(id)", "host > /etc/passwd", ""] {
        let err = start_background_ping(shell.clone(), &target(), destination, TIMEOUT).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidState { .. }), "{destination}: {err}");
    }
    assert!(shell.executed().is_empty());

    let by_name =
        start_background_ping(shell.clone(), &target(), "gateway.example.internal", TIMEOUT)
            .unwrap();
    let by_v6 = start_background_ping(shell.clone(), &target(), "fd00::1", TIMEOUT).unwrap();
    assert_eq!(shell.executed_matching("nohup ping"), 2);
    assert_eq!(by_name.destination(), "gateway.example.internal");
    assert_eq!(by_v6.destination(), "fd00::1");
}

#[test]
fn concurrent_probes_use_separate_logs() {
    let shell = Arc::new(ScriptedShell::new());
    shell.respond("nohup ping", "100", "", 0);
    shell.respond("nohup ping", "200", "", 0);
    shell.respond("kill -INT", SUMMARY, "", 0);

    let first = start_background_ping(shell.clone(), &target(), "10.1.12.3", TIMEOUT).unwrap();
    let second = start_background_ping(shell.clone(), &target(), "10.1.13.3", TIMEOUT).unwrap();
    assert_ne!(first.pid(), second.pid());
    first.stop(TIMEOUT).unwrap();
    second.stop(TIMEOUT).unwrap();

    let starts: Vec<String> = shell
        .executed()
        .iter()
        .filter(|(_, command)| command.contains("nohup ping"))
        .map(|(_, command)| log_path(command))
        .collect();
    assert_eq!(starts.len(), 2);
    assert_ne!(starts[0], starts[1]);
}

#[test]
fn missing_pid_fails_to_start() {
    let shell = Arc::new(ScriptedShell::new());
    shell.respond("nohup ping", "", "nohup: cannot run command", 0);

    let err = start_background_ping(shell, &target(), "10.1.12.3", TIMEOUT).unwrap_err();
    assert!(matches!(err, HarnessError::UnparseableProbeOutput { .. }));
}

#[test]
fn log_without_summary_is_an_error_not_zero_loss() {
    let shell = Arc::new(ScriptedShell::new());
    shell.respond("nohup ping", "4242", "", 0);
    shell.respond("kill -INT", "cat: can't open log: No such file", "", 0);

    let ping = start_background_ping(shell, &target(), "10.1.12.3", TIMEOUT).unwrap();
    let err = ping.stop(TIMEOUT).unwrap_err();

    match err {
        HarnessError::UnparseableProbeOutput { output } => assert!(output.contains("cat:")),
        other => panic!("expected unparseable output, got {other}"),
    }
}

#[test]
fn dropped_probe_is_killed() {
    let shell = Arc::new(ScriptedShell::new());
    shell.respond("nohup ping", "4242", "", 0);

    let ping = start_background_ping(shell.clone(), &target(), "10.1.12.3", TIMEOUT).unwrap();
    drop(ping);

    assert_eq!(shell.executed_matching("kill -INT 4242"), 1);
    assert_eq!(shell.executed_matching("cat /tmp"), 0);
}

#[test]
fn probe_runs_from_a_server_fixture() {
    let env = test_cloud();
    env.shell.respond("nohup ping", "77", "", 0);
    env.shell.respond("kill -INT 77", SUMMARY, "", 0);
    let mut scenario = Scenario::new(env.services.clone(), "probe from server");
    let network = scenario.use_fixture(NetworkFixture::new()).unwrap();
    let server = scenario.use_fixture(ServerFixture::new(&network)).unwrap();
    server
        .ip_addresses(None, Duration::from_secs(2))
        .unwrap();

    let shell: Arc<dyn RemoteShell> = env.services.shell();
    let ping = start_background_ping(
        shell,
        &server.remote_target().unwrap(),
        "8.8.8.8",
        TIMEOUT,
    )
    .unwrap();
    let summary = ping.stop(TIMEOUT).unwrap();

    assert_eq!(summary.packets_transmitted, 37);
    assert!(
        env.shell
            .executed()
            .iter()
            .all(|(host, _)| host == "10.1.11.3")
    );
    assert!(scenario.teardown().is_empty());
}
