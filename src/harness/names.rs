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

//! Random names for cloud objects.
//!
//! Every object name carries [`OBJECT_NAME_PREFIX`] so leftovers from
//! earlier runs can be found by pattern and swept.

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

pub const OBJECT_NAME_PREFIX: &str = "cloudharness-";
pub const DEFAULT_RANDOM_LENGTH: usize = 10;

#[derive(Debug)]
pub struct NameFactory {
    rng: Mutex<StdRng>,
    length: usize,
}

impl Default for NameFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NameFactory {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            length: DEFAULT_RANDOM_LENGTH,
        }
    }

    /// Deterministic names, for reproducing a failing run.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            length: DEFAULT_RANDOM_LENGTH,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// `prefix` followed by `length` random alphanumeric characters.
    pub fn make_string(&self, prefix: &str, length: usize) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let suffix: String = (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        format!("{prefix}{suffix}")
    }

    /// `cloudharness-<kind>-<random>`.
    pub fn make_object_name(&self, kind: &str) -> String {
        self.make_string(&format!("{OBJECT_NAME_PREFIX}{kind}-"), self.length)
    }

    pub fn make_password(&self) -> String {
        self.make_string("password", self.length)
    }
}

/// True when `name` was produced by [`NameFactory::make_object_name`].
pub fn is_harness_name(name: &str) -> bool {
    name.starts_with(OBJECT_NAME_PREFIX)
}
