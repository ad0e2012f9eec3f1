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

use std::fmt;

use crate::common::ProvisionError;

use super::domain::{CreateFirewallRule, CreateLan, CreateNic, CreateServer, CreateVolume};
use super::domain::{DataCenter, FirewallRule, Image, Lan, Location, Nic, RequestStatus, Server, Snapshot, Volume};

/// Id of an asynchronous request, as handed back by the API in the
/// `Location` header of every mutating call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestRef(pub String);

impl fmt::Display for RequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource returned by a mutating call, along with the request that will
/// actually make it exist.
#[derive(Clone, Debug)]
pub struct Tracked<T> {
    pub value:      T,
    pub request:    Option<RequestRef>,
}

impl<T> Tracked<T> {
    pub fn new(value: T, request: Option<RequestRef>) -> Tracked<T> {
        Tracked { value, request }
    }
}

/// The subset of the ProfitBricks Cloud API that provisioning needs.
///
/// Getters return `Ok(None)` when the resource doesn't exist, and deletes of
/// resources which are already gone succeed with no request to wait on.
pub trait ProfitBricksApi {
    fn list_data_centers(&self) -> Result<Vec<DataCenter>, ProvisionError>;
    fn get_data_center(&self, data_center_id: &str) -> Result<Option<DataCenter>, ProvisionError>;

    fn list_servers(&self, data_center_id: &str) -> Result<Vec<Server>, ProvisionError>;
    fn get_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<Server>, ProvisionError>;
    fn create_server(&self, data_center_id: &str, server: &CreateServer) -> Result<Tracked<Server>, ProvisionError>;
    fn delete_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError>;
    fn start_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError>;
    fn stop_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError>;
    fn reboot_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError>;
    fn attach_volume(&self, data_center_id: &str, server_id: &str, volume_id: &str) -> Result<Tracked<Volume>, ProvisionError>;

    fn get_volume(&self, data_center_id: &str, volume_id: &str) -> Result<Option<Volume>, ProvisionError>;
    fn create_volume(&self, data_center_id: &str, volume: &CreateVolume) -> Result<Tracked<Volume>, ProvisionError>;
    fn delete_volume(&self, data_center_id: &str, volume_id: &str) -> Result<Option<RequestRef>, ProvisionError>;

    fn list_lans(&self, data_center_id: &str) -> Result<Vec<Lan>, ProvisionError>;
    fn create_lan(&self, data_center_id: &str, lan: &CreateLan) -> Result<Tracked<Lan>, ProvisionError>;

    fn get_nic(&self, data_center_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>, ProvisionError>;
    fn create_nic(&self, data_center_id: &str, server_id: &str, nic: &CreateNic) -> Result<Tracked<Nic>, ProvisionError>;

    fn create_firewall_rule(&self, data_center_id: &str, server_id: &str, nic_id: &str,
                            rule: &CreateFirewallRule) -> Result<Tracked<FirewallRule>, ProvisionError>;

    fn list_images(&self) -> Result<Vec<Image>, ProvisionError>;
    fn get_image(&self, image_id: &str) -> Result<Option<Image>, ProvisionError>;
    fn list_snapshots(&self) -> Result<Vec<Snapshot>, ProvisionError>;
    fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>, ProvisionError>;
    fn list_locations(&self) -> Result<Vec<Location>, ProvisionError>;

    fn get_request_status(&self, request: &RequestRef) -> Result<RequestStatus, ProvisionError>;
}
