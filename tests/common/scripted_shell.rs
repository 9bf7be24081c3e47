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

use cloud_harness::harness::{
    CommandOutput, HarnessError, RemoteProcess, RemoteShell, RemoteTarget,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Response {
    Finish { output: CommandOutput, after: Duration },
    Hang,
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    /// The last response sticks once the others are used up.
    responses: VecDeque<Response>,
}

/// Remote shell that answers commands from a script instead of a guest.
///
/// Commands are matched by substring against rules in the order they were
/// added. Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    rules: Mutex<Vec<Rule>>,
    executed: Mutex<Vec<(String, String)>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, pattern: &str, stdout: &str, stderr: &str, exit_code: i32) {
        self.push(
            pattern,
            Response::Finish {
                output: CommandOutput::from_text(stdout, stderr, Some(exit_code)),
                after: Duration::ZERO,
            },
        );
    }

    pub fn respond_after(&self, pattern: &str, stdout: &str, after: Duration) {
        self.push(
            pattern,
            Response::Finish {
                output: CommandOutput::from_text(stdout, "", Some(0)),
                after,
            },
        );
    }

    pub fn hang(&self, pattern: &str) {
        self.push(pattern, Response::Hang);
    }

    /// (host, command) pairs in execution order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_matching(&self, pattern: &str) -> usize {
        self.executed()
            .iter()
            .filter(|(_, command)| command.contains(pattern))
            .count()
    }

    fn push(&self, pattern: &str, response: Response) {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|r| r.pattern == pattern) {
            Some(rule) => rule.responses.push_back(response),
            None => rules.push(Rule {
                pattern: pattern.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    fn next_response(&self, command: &str) -> Response {
        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules.iter_mut().find(|r| command.contains(&r.pattern)) else {
            return Response::Finish {
                output: CommandOutput::from_text("", "", Some(0)),
                after: Duration::ZERO,
            };
        };
        if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap()
        } else {
            rule.responses.front().cloned().unwrap()
        }
    }
}

impl RemoteShell for ScriptedShell {
    fn spawn(
        &self,
        target: &RemoteTarget,
        command: &str,
    ) -> Result<Box<dyn RemoteProcess>, HarnessError> {
        self.executed
            .lock()
            .unwrap()
            .push((target.host.clone(), command.to_string()));
        Ok(Box::new(ScriptedProcess {
            started: Instant::now(),
            response: self.next_response(command),
            killed: false,
        }))
    }
}

struct ScriptedProcess {
    started: Instant,
    response: Response,
    killed: bool,
}

impl RemoteProcess for ScriptedProcess {
    fn try_wait(&mut self) -> Result<bool, HarnessError> {
        Ok(match &self.response {
            _ if self.killed => true,
            Response::Finish { after, .. } => self.started.elapsed() >= *after,
            Response::Hang => false,
        })
    }

    fn kill(&mut self) {
        self.killed = true;
    }

    fn output(self: Box<Self>) -> Result<CommandOutput, HarnessError> {
        match self.response {
            Response::Finish { output, .. } if !self.killed => Ok(output),
            _ => Ok(CommandOutput::from_text("", "", None)),
        }
    }
}
