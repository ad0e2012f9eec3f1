/*
 pbprod
 Copyright 2024-2025 Peter Pearson.
 Licensed under the Apache License, Version 2.0 (the "License");
 You may not use this file except in compliance with the License.
 You may obtain a copy of the License at
 http://www.apache.org/licenses/LICENSE-2.0
 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.
 ---------
*/

use std::time::{Duration, Instant};

use crate::common::ProvisionError;

const BACKOFF_FACTOR: f64 = 1.5;

#[derive(Clone, Debug, PartialEq)]
pub struct PollingConfig {
    pub timeout:        Duration,
    pub period:         Duration,
    pub max_period:     Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig { timeout: Duration::from_secs(900),
                        period: Duration::from_secs(5),
                        max_period: Duration::from_secs(30) }
    }
}

impl PollingConfig {
    pub fn new(timeout: Duration, period: Duration, max_period: Duration) -> PollingConfig {
        // a max period below the initial one would make the backoff shrink
        let max_period = max_period.max(period);
        PollingConfig { timeout, period, max_period }
    }
}

/// Repeatedly evaluates `check` until it reports `true`, backing off between
/// attempts. Errors from `check` are returned straight away, and running past
/// the configured timeout gives a `ProvisionError::Timeout` naming `what`.
pub fn poll_until<F>(config: &PollingConfig, what: &str, mut check: F) -> Result<(), ProvisionError>
    where F: FnMut() -> Result<bool, ProvisionError> {
    let start = Instant::now();
    let mut period = config.period;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if check()? {
            tracing::trace!("'{}' satisfied after {} attempt(s)", what, attempt);
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(ProvisionError::Timeout { what: what.to_string(), waited: elapsed });
        }

        let remaining = config.timeout - elapsed;
        std::thread::sleep(period.min(remaining));

        period = period.mul_f64(BACKOFF_FACTOR).min(config.max_period);
    }
}
