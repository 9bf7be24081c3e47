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

//! Bounded waiting and retrying.
//!
//! Every wait has an explicit deadline and ends in [`HarnessError::Timeout`]
//! rather than hanging. A timed-out wait only stops polling; whatever the
//! backend was doing keeps going.

use crate::harness::error::HarnessError;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Poll `predicate` every `interval` until it holds or `timeout` elapses.
pub fn wait_until<F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut predicate: F,
) -> Result<(), HarnessError>
where
    F: FnMut() -> bool,
{
    poll_until(what, timeout, interval, || Ok(predicate().then_some(())))
}

/// Poll `probe` until it yields a value, fails, or `timeout` elapses.
///
/// Errors from `probe` end the wait immediately.
pub fn poll_until<T, F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Result<Option<T>, HarnessError>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(value) = probe()? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            debug!("Gave up waiting for {what} after {attempt} attempts");
            return Err(HarnessError::timeout(what, timeout));
        }
        thread::sleep(interval.min(deadline - now));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}

/// Run `op` until `is_retryable` rejects its result or attempts run out.
///
/// The last attempt's result is returned as is, even when still retryable.
pub fn retry<T, R, F>(policy: &RetryPolicy, is_retryable: R, mut op: F) -> T
where
    R: Fn(&T) -> bool,
    F: FnMut() -> T,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = op();
        if attempt >= attempts || !is_retryable(&result) {
            return result;
        }
        debug!(
            "Attempt {attempt}/{attempts} is retryable, sleeping {:?}",
            policy.delay
        );
        thread::sleep(policy.delay);
        attempt += 1;
    }
}
