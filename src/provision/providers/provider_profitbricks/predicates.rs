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

// Waits for eventually-consistent state. Things which aren't visible yet
// (404s straight after creation) just count as "not yet".

use crate::common::ProvisionError;
use crate::provision::polling::{poll_until, PollingConfig};

use super::api::{ProfitBricksApi, RequestRef};
use super::domain::{RequestState, ResourceState, VmState};

pub struct Waiter<'a, A: ProfitBricksApi> {
    api:        &'a A,
    config:     &'a PollingConfig,
}

impl<'a, A: ProfitBricksApi> Waiter<'a, A> {
    pub fn new(api: &'a A, config: &'a PollingConfig) -> Waiter<'a, A> {
        Waiter { api, config }
    }

    pub fn data_center_available(&self, data_center_id: &str) -> Result<(), ProvisionError> {
        poll_until(self.config, &format!("data center {} to be AVAILABLE", data_center_id), || {
            let dc = self.api.get_data_center(data_center_id)?;
            Ok(dc.map_or(false, |dc| dc.metadata.state == ResourceState::Available))
        })
    }

    pub fn server_available(&self, data_center_id: &str, server_id: &str) -> Result<(), ProvisionError> {
        poll_until(self.config, &format!("server {} to be AVAILABLE", server_id), || {
            let server = self.api.get_server(data_center_id, server_id)?;
            Ok(server.map_or(false, |s| s.metadata.state == ResourceState::Available))
        })
    }

    pub fn server_running(&self, data_center_id: &str, server_id: &str) -> Result<(), ProvisionError> {
        self.server_vm_state(data_center_id, server_id, VmState::Running, "RUNNING")
    }

    pub fn server_suspended(&self, data_center_id: &str, server_id: &str) -> Result<(), ProvisionError> {
        self.server_vm_state(data_center_id, server_id, VmState::Shutoff, "SHUTOFF")
    }

    fn server_vm_state(&self, data_center_id: &str, server_id: &str, wanted: VmState, label: &str) -> Result<(), ProvisionError> {
        poll_until(self.config, &format!("server {} to be {}", server_id, label), || {
            let server = self.api.get_server(data_center_id, server_id)?;
            Ok(server.map_or(false, |s| s.properties.vm_state == wanted))
        })
    }

    pub fn volume_available(&self, data_center_id: &str, volume_id: &str) -> Result<(), ProvisionError> {
        poll_until(self.config, &format!("volume {} to be AVAILABLE", volume_id), || {
            let volume = self.api.get_volume(data_center_id, volume_id)?;
            Ok(volume.map_or(false, |v| v.metadata.state == ResourceState::Available))
        })
    }

    pub fn nic_available(&self, data_center_id: &str, server_id: &str, nic_id: &str) -> Result<(), ProvisionError> {
        poll_until(self.config, &format!("NIC {} to be AVAILABLE", nic_id), || {
            let nic = self.api.get_nic(data_center_id, server_id, nic_id)?;
            Ok(nic.map_or(false, |n| n.metadata.state == ResourceState::Available))
        })
    }

    /// Blocks until the asynchronous request is DONE. A FAILED request becomes
    /// `ProvisionError::RequestFailed`; no request means nothing to wait for.
    pub fn request_completed(&self, request: Option<&RequestRef>) -> Result<(), ProvisionError> {
        let request = match request {
            Some(request) => request,
            None => return Ok(()),
        };

        poll_until(self.config, &format!("request {} to complete", request), || {
            let status = self.api.get_request_status(request)?;
            match status.metadata.status {
                RequestState::Done => Ok(true),
                RequestState::Failed => {
                    Err(ProvisionError::RequestFailed { request: request.to_string(),
                                                        message: status.metadata.message.unwrap_or_default() })
                },
                _ => Ok(false)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::provision::providers::provider_profitbricks::fake_api::FakeProfitBricksApi;

    fn quick_polling() -> PollingConfig {
        PollingConfig::new(Duration::from_millis(50), Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn busy_server_becomes_available() {
        let api = FakeProfitBricksApi::new();
        let dc = api.add_data_center("us/las");
        let server_id = api.add_server(&dc, "web-a01", VmState::Running);
        api.set_busy_polls(&server_id, 2);

        let polling = quick_polling();
        let waiter = Waiter::new(&api, &polling);
        waiter.server_available(&dc, &server_id).unwrap();
        assert_eq!(api.count_calls(&format!("get_server {}", server_id)), 3);
    }

    #[test]
    fn failed_request_surfaces_message() {
        let api = FakeProfitBricksApi::new();
        let request = api.add_request(RequestState::Failed, "out of capacity");

        let polling = quick_polling();
        let waiter = Waiter::new(&api, &polling);
        match waiter.request_completed(Some(&request)) {
            Err(ProvisionError::RequestFailed { message, .. }) => assert_eq!(message, "out of capacity"),
            other => panic!("expected failed request, got {:?}", other),
        }
    }

    #[test]
    fn no_request_is_immediately_complete() {
        let api = FakeProfitBricksApi::new();
        let polling = quick_polling();
        let waiter = Waiter::new(&api, &polling);
        assert!(waiter.request_completed(None).is_ok());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn missing_server_times_out() {
        let api = FakeProfitBricksApi::new();
        let dc = api.add_data_center("us/las");

        let polling = quick_polling();
        let waiter = Waiter::new(&api, &polling);
        assert!(matches!(waiter.server_running(&dc, "not-there"), Err(ProvisionError::Timeout { .. })));
    }
}
