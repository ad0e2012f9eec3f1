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

use std::time::Duration;

use crate::common::ProvisionError;
use crate::provision::polling::PollingConfig;

pub const DEFAULT_ENDPOINT: &str = "https://api.profitbricks.com/cloudapi/v4";

pub const ENV_USERNAME: &str = "PBPROD_PROFITBRICKS_USERNAME";
pub const ENV_PASSWORD: &str = "PBPROD_PROFITBRICKS_PASSWORD";
pub const ENV_ENDPOINT: &str = "PBPROD_PROFITBRICKS_ENDPOINT";
pub const ENV_POLL_TIMEOUT: &str = "PBPROD_POLL_TIMEOUT_SECS";
pub const ENV_POLL_PERIOD: &str = "PBPROD_POLL_PERIOD_SECS";
pub const ENV_POLL_MAX_PERIOD: &str = "PBPROD_POLL_MAX_PERIOD_SECS";
pub const ENV_HTTP_TIMEOUT: &str = "PBPROD_HTTP_TIMEOUT_SECS";

#[derive(Clone, Debug, PartialEq)]
pub struct ProfitBricksConfig {
    pub endpoint:       String,
    pub username:       String,
    pub password:       String,
    pub http_timeout:   Duration,
    pub polling:        PollingConfig,
}

impl ProfitBricksConfig {
    pub fn from_env() -> Result<ProfitBricksConfig, ProvisionError> {
        ProfitBricksConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (normally the process
    /// environment). A missing password is left empty so the caller can ask
    /// for it interactively, see `is_complete()`.
    pub fn from_lookup<F>(lookup: F) -> Result<ProfitBricksConfig, ProvisionError>
        where F: Fn(&str) -> Option<String> {
        let get_trimmed = |key: &str| -> Option<String> {
            lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };

        let username = get_trimmed(ENV_USERNAME)
            .ok_or_else(|| ProvisionError::NotConfigured(format!("${} is not set", ENV_USERNAME)))?;
        let password = get_trimmed(ENV_PASSWORD).unwrap_or_default();

        let endpoint = get_trimmed(ENV_ENDPOINT).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let get_secs = |key: &str, default: u64| -> Result<Duration, ProvisionError> {
            match get_trimmed(key) {
                Some(val) => {
                    let secs = val.parse::<u64>()
                        .map_err(|_| ProvisionError::NotConfigured(format!("${} must be a whole number of seconds, got '{}'", key, val)))?;
                    Ok(Duration::from_secs(secs))
                },
                None => Ok(Duration::from_secs(default))
            }
        };

        let defaults = PollingConfig::default();
        let polling = PollingConfig::new(get_secs(ENV_POLL_TIMEOUT, defaults.timeout.as_secs())?,
                                         get_secs(ENV_POLL_PERIOD, defaults.period.as_secs())?,
                                         get_secs(ENV_POLL_MAX_PERIOD, defaults.max_period.as_secs())?);

        Ok(ProfitBricksConfig { endpoint, username, password,
                                http_timeout: get_secs(ENV_HTTP_TIMEOUT, 60)?,
                                polling })
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
