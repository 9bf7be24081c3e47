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

//! Thread-safe pool of subnet block indices.
//!
//! Concurrent scenarios draw their CIDR block from one shared pool so two
//! live subnets never share an index. Every index is either free or issued,
//! never both, and returning an index that is not issued is an error.

use crate::harness::config::SubnetRange;
use crate::harness::error::HarnessError;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct PoolState {
    free: BTreeSet<u16>,
    issued: BTreeSet<u16>,
}

#[derive(Debug)]
pub struct SubnetPool {
    range: SubnetRange,
    state: Mutex<PoolState>,
}

impl SubnetPool {
    pub fn new(range: SubnetRange) -> Self {
        Self {
            range,
            state: Mutex::new(PoolState {
                free: (range.first..=range.last).collect(),
                issued: BTreeSet::new(),
            }),
        }
    }

    pub fn range(&self) -> SubnetRange {
        self.range
    }

    pub fn acquire(&self) -> Result<u16, HarnessError> {
        let mut state = self.lock();
        let index = state.free.pop_first().ok_or(HarnessError::ExhaustedPool {
            first: self.range.first,
            last: self.range.last,
        })?;
        state.issued.insert(index);
        debug!("Issued subnet index {index}, {} left", state.free.len());
        Ok(index)
    }

    pub fn release(&self, index: u16) -> Result<(), HarnessError> {
        let mut state = self.lock();
        if !state.issued.remove(&index) {
            return Err(HarnessError::SubnetNotIssued { index });
        }
        state.free.insert(index);
        debug!("Returned subnet index {index}, {} free", state.free.len());
        Ok(())
    }

    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    pub fn issued(&self) -> usize {
        self.lock().issued.len()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
