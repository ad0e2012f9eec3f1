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

// In-memory stand-in for the Cloud API, for driving the orchestration in
// tests. Every call is logged as "<method> <subject>" so tests can assert
// on ordering, and any logged call (or a whole method) can be made to fail.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::common::ProvisionError;

use super::api::{ProfitBricksApi, RequestRef, Tracked};
use super::domain::*;

#[derive(Default)]
struct FakeState {
    next_id:            u32,
    data_centers:       BTreeMap<String, DataCenter>,
    // keyed on (data center, server)
    servers:            BTreeMap<(String, String), Server>,
    volumes:            BTreeMap<(String, String), Volume>,
    lans:               BTreeMap<String, Vec<Lan>>,
    images:             Vec<Image>,
    snapshots:          Vec<Snapshot>,
    requests:           HashMap<String, RequestStatus>,
    busy_polls:         HashMap<String, u32>,
    failures:           HashSet<String>,
    failed_requests:    HashSet<String>,
    calls:              Vec<String>,

    created_volumes:    Vec<CreateVolume>,
    created_servers:    Vec<CreateServer>,
    created_nics:       Vec<CreateNic>,
    created_rules:      Vec<CreateFirewallRule>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn record(&mut self, call: String) -> Result<(), ProvisionError> {
        let method = call.split(' ').next().unwrap_or_default().to_string();
        let fail = self.failures.contains(&call) || self.failures.contains(&method);
        self.calls.push(call.clone());
        if fail {
            return Err(ProvisionError::Api { status: 500, message: format!("injected failure: {}", call) });
        }
        Ok(())
    }

    // the request belongs to the last recorded call
    fn new_request(&mut self) -> RequestRef {
        let id = self.next_id("req");
        let call = self.calls.last().cloned().unwrap_or_default();
        let method = call.split(' ').next().unwrap_or_default();
        let metadata = if self.failed_requests.contains(&call) || self.failed_requests.contains(method) {
            RequestStatusMetadata { status: RequestState::Failed, message: Some(format!("request of {} failed", call)) }
        }
        else {
            RequestStatusMetadata { status: RequestState::Done, message: None }
        };
        self.requests.insert(id.clone(), RequestStatus { metadata });
        RequestRef(id)
    }

    fn take_busy(&mut self, id: &str) -> bool {
        match self.busy_polls.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            },
            _ => false
        }
    }

    fn with_busy_state<T>(&mut self, id: &str, mut value: T, metadata: fn(&mut T) -> &mut Metadata) -> T {
        if self.take_busy(id) {
            metadata(&mut value).state = ResourceState::Busy;
        }
        value
    }
}

pub struct FakeProfitBricksApi {
    state:      RefCell<FakeState>,
}

impl FakeProfitBricksApi {
    pub fn new() -> FakeProfitBricksApi {
        FakeProfitBricksApi { state: RefCell::new(FakeState::default()) }
    }

    pub fn add_data_center(&self, location: &str) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.next_id("dc");
        state.data_centers.insert(id.clone(), DataCenter {
            id: id.clone(),
            metadata: Metadata::available(),
            properties: DataCenterProperties { name: format!("{} dc", location), location: location.to_string(), description: None },
        });
        id
    }

    pub fn add_server(&self, data_center_id: &str, name: &str, vm_state: VmState) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.next_id("srv");
        let server = Server {
            id: id.clone(),
            metadata: Metadata::available(),
            properties: ServerProperties { name: name.to_string(), cores: 1, ram: 1024, vm_state, ..Default::default() },
            entities: ServerEntities::default(),
        };
        state.servers.insert((data_center_id.to_string(), id.clone()), server);
        id
    }

    /// Attaches an existing volume without going through the API.
    pub fn add_attached_volume(&self, data_center_id: &str, server_id: &str, size: f32) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.next_id("vol");
        let volume = Volume { id: id.clone(), metadata: Metadata::available(),
                              properties: VolumeProperties { name: id.clone(), size, ..Default::default() } };
        state.volumes.insert((data_center_id.to_string(), id.clone()), volume.clone());
        if let Some(server) = state.servers.get_mut(&(data_center_id.to_string(), server_id.to_string())) {
            server.entities.volumes.items.push(volume);
        }
        id
    }

    pub fn add_lan(&self, data_center_id: &str, public: bool) -> String {
        let mut state = self.state.borrow_mut();
        let lans = state.lans.entry(data_center_id.to_string()).or_default();
        let id = (lans.len() + 1).to_string();
        lans.push(Lan { id: id.clone(), metadata: Metadata::available(),
                        properties: LanProperties { name: format!("lan {}", id), public } });
        id
    }

    pub fn add_image(&self, id: &str, location: &str, image_type: &str) {
        self.state.borrow_mut().images.push(Image {
            id: id.to_string(),
            properties: ImageProperties { name: format!("{} image", id), location: Some(location.to_string()),
                                          size: Some(2.0), public: true, image_type: Some(image_type.to_string()),
                                          licence_type: Some("LINUX".to_string()) },
        });
    }

    pub fn add_snapshot(&self, id: &str, location: &str) {
        self.state.borrow_mut().snapshots.push(Snapshot {
            id: id.to_string(),
            metadata: Metadata::available(),
            properties: SnapshotProperties { name: format!("{} snapshot", id), location: Some(location.to_string()),
                                             size: Some(10.0), licence_type: Some("LINUX".to_string()) },
        });
    }

    pub fn add_request(&self, status: RequestState, message: &str) -> RequestRef {
        let mut state = self.state.borrow_mut();
        let id = state.next_id("req");
        state.requests.insert(id.clone(), RequestStatus {
            metadata: RequestStatusMetadata { status, message: Some(message.to_string()) }
        });
        RequestRef(id)
    }

    /// The next `polls` reads of the resource report it as BUSY.
    pub fn set_busy_polls(&self, resource_id: &str, polls: u32) {
        self.state.borrow_mut().busy_polls.insert(resource_id.to_string(), polls);
    }

    /// Fails either a whole method ("create_nic") or one exact call
    /// ("attach_volume srv-4 vol-2").
    pub fn fail_on(&self, call: &str) {
        self.state.borrow_mut().failures.insert(call.to_string());
    }

    /// The call itself succeeds, but the request it returns reports FAILED.
    /// Matches a method or an exact call, like `fail_on`.
    pub fn fail_request_of(&self, call: &str) {
        self.state.borrow_mut().failed_requests.insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.state.borrow().calls.iter()
            .filter(|c| !c.starts_with("get_") && !c.starts_with("list_"))
            .cloned()
            .collect()
    }

    pub fn server_exists(&self, data_center_id: &str, server_id: &str) -> bool {
        self.state.borrow().servers.contains_key(&(data_center_id.to_string(), server_id.to_string()))
    }

    pub fn server_ids(&self, data_center_id: &str) -> Vec<String> {
        self.state.borrow().servers.keys().filter(|(dc, _)| dc == data_center_id).map(|(_, id)| id.clone()).collect()
    }

    pub fn volume_ids(&self, data_center_id: &str) -> Vec<String> {
        self.state.borrow().volumes.keys().filter(|(dc, _)| dc == data_center_id).map(|(_, id)| id.clone()).collect()
    }

    pub fn lans(&self, data_center_id: &str) -> Vec<Lan> {
        self.state.borrow().lans.get(data_center_id).cloned().unwrap_or_default()
    }

    pub fn created_volumes(&self) -> Vec<CreateVolume> {
        self.state.borrow().created_volumes.clone()
    }

    pub fn created_servers(&self) -> Vec<CreateServer> {
        self.state.borrow().created_servers.clone()
    }

    pub fn created_nics(&self) -> Vec<CreateNic> {
        self.state.borrow().created_nics.clone()
    }

    pub fn created_rules(&self) -> Vec<CreateFirewallRule> {
        self.state.borrow().created_rules.clone()
    }

    fn set_vm_state(&self, call: String, data_center_id: &str, server_id: &str, vm_state: Option<VmState>) -> Result<Option<RequestRef>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(call)?;
        let server = state.servers.get_mut(&(data_center_id.to_string(), server_id.to_string()))
            .ok_or_else(|| ProvisionError::NotFound(format!("server {}", server_id)))?;
        if let Some(vm_state) = vm_state {
            server.properties.vm_state = vm_state;
        }
        Ok(Some(state.new_request()))
    }
}

impl ProfitBricksApi for FakeProfitBricksApi {
    fn list_data_centers(&self) -> Result<Vec<DataCenter>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record("list_data_centers".to_string())?;
        Ok(state.data_centers.values().cloned().collect())
    }

    fn get_data_center(&self, data_center_id: &str) -> Result<Option<DataCenter>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_data_center {}", data_center_id))?;
        let dc = state.data_centers.get(data_center_id).cloned();
        Ok(dc.map(|dc| state.with_busy_state(data_center_id, dc, |d| &mut d.metadata)))
    }

    fn list_servers(&self, data_center_id: &str) -> Result<Vec<Server>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("list_servers {}", data_center_id))?;
        Ok(state.servers.iter().filter(|((dc, _), _)| dc == data_center_id).map(|(_, s)| s.clone()).collect())
    }

    fn get_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<Server>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_server {}", server_id))?;
        let server = state.servers.get(&(data_center_id.to_string(), server_id.to_string())).cloned();
        Ok(server.map(|s| state.with_busy_state(server_id, s, |s| &mut s.metadata)))
    }

    fn create_server(&self, data_center_id: &str, server: &CreateServer) -> Result<Tracked<Server>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_server {}", server.name))?;
        state.created_servers.push(server.clone());

        let id = state.next_id("srv");
        let created = Server {
            id: id.clone(),
            metadata: Metadata::available(),
            properties: ServerProperties { name: server.name.clone(), cores: server.cores, ram: server.ram,
                                           vm_state: VmState::Running, boot_volume: Some(server.boot_volume.clone()),
                                           availability_zone: Some("AUTO".to_string()) },
            entities: ServerEntities::default(),
        };
        state.servers.insert((data_center_id.to_string(), id), created.clone());
        let request = state.new_request();
        Ok(Tracked::new(created, Some(request)))
    }

    fn delete_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("delete_server {}", server_id))?;
        match state.servers.remove(&(data_center_id.to_string(), server_id.to_string())) {
            Some(_) => Ok(Some(state.new_request())),
            None => Ok(None),
        }
    }

    fn start_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.set_vm_state(format!("start_server {}", server_id), data_center_id, server_id, Some(VmState::Running))
    }

    fn stop_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.set_vm_state(format!("stop_server {}", server_id), data_center_id, server_id, Some(VmState::Shutoff))
    }

    fn reboot_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.set_vm_state(format!("reboot_server {}", server_id), data_center_id, server_id, None)
    }

    fn attach_volume(&self, data_center_id: &str, server_id: &str, volume_id: &str) -> Result<Tracked<Volume>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("attach_volume {} {}", server_id, volume_id))?;
        let volume = state.volumes.get(&(data_center_id.to_string(), volume_id.to_string())).cloned()
            .ok_or_else(|| ProvisionError::NotFound(format!("volume {}", volume_id)))?;
        let server = state.servers.get_mut(&(data_center_id.to_string(), server_id.to_string()))
            .ok_or_else(|| ProvisionError::NotFound(format!("server {}", server_id)))?;
        server.entities.volumes.items.push(volume.clone());
        let request = state.new_request();
        Ok(Tracked::new(volume, Some(request)))
    }

    fn get_volume(&self, data_center_id: &str, volume_id: &str) -> Result<Option<Volume>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_volume {}", volume_id))?;
        let volume = state.volumes.get(&(data_center_id.to_string(), volume_id.to_string())).cloned();
        Ok(volume.map(|v| state.with_busy_state(volume_id, v, |v| &mut v.metadata)))
    }

    fn create_volume(&self, data_center_id: &str, volume: &CreateVolume) -> Result<Tracked<Volume>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_volume {}", volume.name))?;
        state.created_volumes.push(volume.clone());

        let id = state.next_id("vol");
        let created = Volume {
            id: id.clone(),
            metadata: Metadata::available(),
            properties: VolumeProperties { name: volume.name.clone(), size: volume.size as f32,
                                           volume_type: Some(volume.volume_type.clone()), image: volume.image.clone(),
                                           licence_type: volume.licence_type.clone(), device_number: None },
        };
        state.volumes.insert((data_center_id.to_string(), id), created.clone());
        let request = state.new_request();
        Ok(Tracked::new(created, Some(request)))
    }

    fn delete_volume(&self, data_center_id: &str, volume_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("delete_volume {}", volume_id))?;
        for server in state.servers.values_mut() {
            server.entities.volumes.items.retain(|v| v.id != volume_id);
        }
        match state.volumes.remove(&(data_center_id.to_string(), volume_id.to_string())) {
            Some(_) => Ok(Some(state.new_request())),
            None => Ok(None),
        }
    }

    fn list_lans(&self, data_center_id: &str) -> Result<Vec<Lan>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("list_lans {}", data_center_id))?;
        Ok(state.lans.get(data_center_id).cloned().unwrap_or_default())
    }

    fn create_lan(&self, data_center_id: &str, lan: &CreateLan) -> Result<Tracked<Lan>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_lan {}", lan.name))?;
        let lans = state.lans.entry(data_center_id.to_string()).or_default();
        let created = Lan { id: (lans.len() + 1).to_string(), metadata: Metadata::available(),
                            properties: LanProperties { name: lan.name.clone(), public: lan.public } };
        lans.push(created.clone());
        let request = state.new_request();
        Ok(Tracked::new(created, Some(request)))
    }

    fn get_nic(&self, data_center_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_nic {}", nic_id))?;
        let nic = state.servers.get(&(data_center_id.to_string(), server_id.to_string()))
            .and_then(|s| s.entities.nics.items.iter().find(|n| n.id == nic_id).cloned());
        Ok(nic.map(|n| state.with_busy_state(nic_id, n, |n| &mut n.metadata)))
    }

    fn create_nic(&self, data_center_id: &str, server_id: &str, nic: &CreateNic) -> Result<Tracked<Nic>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_nic {}", nic.name))?;
        state.created_nics.push(nic.clone());

        let id = state.next_id("nic");
        let ip = format!("158.222.102.{}", state.next_id);
        let created = Nic { id, metadata: Metadata::available(),
                            properties: NicProperties { name: nic.name.clone(), ips: vec![ip], dhcp: nic.dhcp,
                                                        lan: nic.lan, firewall_active: nic.firewall_active } };
        let server = state.servers.get_mut(&(data_center_id.to_string(), server_id.to_string()))
            .ok_or_else(|| ProvisionError::NotFound(format!("server {}", server_id)))?;
        server.entities.nics.items.push(created.clone());
        let request = state.new_request();
        Ok(Tracked::new(created, Some(request)))
    }

    fn create_firewall_rule(&self, _data_center_id: &str, _server_id: &str, _nic_id: &str,
                            rule: &CreateFirewallRule) -> Result<Tracked<FirewallRule>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_firewall_rule {}-{}", rule.port_range_start, rule.port_range_end))?;
        state.created_rules.push(rule.clone());

        let id = state.next_id("fw");
        let created = FirewallRule { id, metadata: Metadata::available(),
                                     properties: FirewallRuleProperties { name: rule.name.clone(), protocol: rule.protocol.clone(),
                                                                          port_range_start: Some(rule.port_range_start),
                                                                          port_range_end: Some(rule.port_range_end) } };
        let request = state.new_request();
        Ok(Tracked::new(created, Some(request)))
    }

    fn list_images(&self) -> Result<Vec<Image>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record("list_images".to_string())?;
        Ok(state.images.clone())
    }

    fn get_image(&self, image_id: &str) -> Result<Option<Image>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_image {}", image_id))?;
        Ok(state.images.iter().find(|i| i.id == image_id).cloned())
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record("list_snapshots".to_string())?;
        Ok(state.snapshots.clone())
    }

    fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_snapshot {}", snapshot_id))?;
        Ok(state.snapshots.iter().find(|s| s.id == snapshot_id).cloned())
    }

    fn list_locations(&self) -> Result<Vec<Location>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record("list_locations".to_string())?;
        Ok(vec![Location { id: "us/las".to_string(), properties: LocationProperties { name: "lasvegas".to_string() } },
                Location { id: "de/fra".to_string(), properties: LocationProperties { name: "frankfurt".to_string() } }])
    }

    fn get_request_status(&self, request: &RequestRef) -> Result<RequestStatus, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("get_request_status {}", request))?;
        state.requests.get(&request.0).cloned()
            .ok_or_else(|| ProvisionError::NotFound(format!("request {}", request)))
    }
}
