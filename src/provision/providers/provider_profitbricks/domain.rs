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

#![allow(dead_code)]

// Cloud API v4 resources. Only the fields provisioning cares about are
// modelled, everything else in the responses is ignored.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ResourceState {
    Available,
    Busy,
    Inactive,
    Deploying,
    Destroying,
    #[default]
    Unrecognized,
}

impl From<String> for ResourceState {
    fn from(val: String) -> Self {
        match val.as_str() {
            "AVAILABLE"  => ResourceState::Available,
            "BUSY"       => ResourceState::Busy,
            "INACTIVE"   => ResourceState::Inactive,
            "DEPLOYING"  => ResourceState::Deploying,
            "DESTROYING" => ResourceState::Destroying,
            _            => ResourceState::Unrecognized,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VmState {
    Running,
    Shutoff,
    Shutdown,
    Paused,
    Blocked,
    Crashed,
    NoState,
    #[default]
    Unrecognized,
}

impl From<String> for VmState {
    fn from(val: String) -> Self {
        match val.as_str() {
            "RUNNING"  => VmState::Running,
            "SHUTOFF"  => VmState::Shutoff,
            "SHUTDOWN" => VmState::Shutdown,
            "PAUSED"   => VmState::Paused,
            "BLOCKED"  => VmState::Blocked,
            "CRASHED"  => VmState::Crashed,
            "NOSTATE"  => VmState::NoState,
            _          => VmState::Unrecognized,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RequestState {
    Queued,
    Running,
    Done,
    Failed,
    #[default]
    Unrecognized,
}

impl From<String> for RequestState {
    fn from(val: String) -> Self {
        match val.as_str() {
            "QUEUED"  => RequestState::Queued,
            "RUNNING" => RequestState::Running,
            "DONE"    => RequestState::Done,
            "FAILED"  => RequestState::Failed,
            _         => RequestState::Unrecognized,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub state:      ResourceState,
}

impl Metadata {
    pub fn available() -> Metadata {
        Metadata { state: ResourceState::Available }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Collection<T> {
    #[serde(default)]
    pub items:      Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection { items: Vec::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResourceRef {
    pub id:         String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DataCenter {
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    pub properties: DataCenterProperties,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DataCenterProperties {
    #[serde(default)]
    pub name:       String,
    // e.g. "us/las"
    #[serde(default)]
    pub location:   String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Server {
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    pub properties: ServerProperties,
    #[serde(default)]
    pub entities:   ServerEntities,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProperties {
    #[serde(default)]
    pub name:       String,
    #[serde(default)]
    pub cores:      u32,
    #[serde(default)]
    pub ram:        u32,
    #[serde(default)]
    pub vm_state:   VmState,
    pub boot_volume: Option<ResourceRef>,
    pub availability_zone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ServerEntities {
    #[serde(default)]
    pub volumes:    Collection<Volume>,
    #[serde(default)]
    pub nics:       Collection<Nic>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Volume {
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    #[serde(default)]
    pub properties: VolumeProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProperties {
    #[serde(default)]
    pub name:       String,
    #[serde(default)]
    pub size:       f32,
    #[serde(rename = "type")]
    pub volume_type: Option<String>,
    pub image:      Option<String>,
    pub licence_type: Option<String>,
    pub device_number: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Lan {
    // LAN ids are small integers, but come back as strings
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    pub properties: LanProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LanProperties {
    #[serde(default)]
    pub name:       String,
    #[serde(default)]
    pub public:     bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Nic {
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    #[serde(default)]
    pub properties: NicProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    #[serde(default)]
    pub name:       String,
    #[serde(default)]
    pub ips:        Vec<String>,
    #[serde(default)]
    pub dhcp:       bool,
    #[serde(default)]
    pub lan:        u32,
    #[serde(default)]
    pub firewall_active: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FirewallRule {
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    #[serde(default)]
    pub properties: FirewallRuleProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleProperties {
    #[serde(default)]
    pub name:       String,
    #[serde(default)]
    pub protocol:   String,
    pub port_range_start: Option<u16>,
    pub port_range_end: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Image {
    pub id:         String,
    pub properties: ImageProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProperties {
    #[serde(default)]
    pub name:       String,
    pub location:   Option<String>,
    pub size:       Option<f32>,
    #[serde(default)]
    pub public:     bool,
    // "HDD" or "CDROM"
    pub image_type: Option<String>,
    pub licence_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Snapshot {
    pub id:         String,
    #[serde(default)]
    pub metadata:   Metadata,
    pub properties: SnapshotProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotProperties {
    #[serde(default)]
    pub name:       String,
    pub location:   Option<String>,
    pub size:       Option<f32>,
    pub licence_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Location {
    // e.g. "de/fra"
    pub id:         String,
    #[serde(default)]
    pub properties: LocationProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LocationProperties {
    #[serde(default)]
    pub name:       String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RequestStatus {
    pub metadata:   RequestStatusMetadata,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RequestStatusMetadata {
    #[serde(default)]
    pub status:     RequestState,
    pub message:    Option<String>,
}

// create payloads, sent wrapped in a {"properties": {...}} envelope

#[derive(Debug, Serialize)]
pub struct Payload<'a, T> {
    pub properties: &'a T,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolume {
    pub name:       String,
    pub size:       u32,
    #[serde(rename = "type")]
    pub volume_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image:      Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys:   Vec<String>,
    // required by the API for volumes with no image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licence_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServer {
    pub name:       String,
    pub cores:      u32,
    pub ram:        u32,
    pub boot_volume: ResourceRef,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateLan {
    pub name:       String,
    pub public:     bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNic {
    pub name:       String,
    pub dhcp:       bool,
    pub lan:        u32,
    pub firewall_active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFirewallRule {
    pub name:       String,
    pub protocol:   String,
    pub port_range_start: u16,
    pub port_range_end: u16,
}
