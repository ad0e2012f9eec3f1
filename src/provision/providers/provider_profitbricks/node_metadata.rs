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

use std::net::IpAddr;

use crate::provision::provision_common::{NodeId, NodeMetadata, NodeStatus};

use super::domain::{ResourceState, Server, VmState};

pub fn server_to_node_metadata(data_center_id: &str, location: &str, server: &Server) -> NodeMetadata {
    let props = &server.properties;

    let boot_volume_id = props.boot_volume.as_ref().map(|r| r.id.as_str());
    // the boot volume is the one carrying the image
    let image_id = server.entities.volumes.items.iter()
        .find(|v| Some(v.id.as_str()) == boot_volume_id)
        .or_else(|| server.entities.volumes.items.first())
        .and_then(|v| v.properties.image.clone());

    let mut public_ips = Vec::new();
    let mut private_ips = Vec::new();
    for nic in &server.entities.nics.items {
        for ip in &nic.properties.ips {
            if is_private_address(ip) {
                private_ips.push(ip.clone());
            }
            else {
                public_ips.push(ip.clone());
            }
        }
    }

    NodeMetadata {
        id:             NodeId::new(data_center_id, &server.id),
        name:           props.name.clone(),
        group:          group_from_name(&props.name),
        location:       location.to_string(),
        status:         node_status(server),
        cores:          props.cores,
        ram_mb:         props.ram,
        volume_sizes:   server.entities.volumes.items.iter().map(|v| v.properties.size.round() as u32).collect(),
        image_id,
        public_ips,
        private_ips,
    }
}

pub fn node_status(server: &Server) -> NodeStatus {
    if server.metadata.state == ResourceState::Busy || server.metadata.state == ResourceState::Deploying {
        return NodeStatus::Pending;
    }
    if server.metadata.state == ResourceState::Destroying {
        return NodeStatus::Terminated;
    }

    match server.properties.vm_state {
        VmState::Running                                        => NodeStatus::Running,
        VmState::Shutoff | VmState::Shutdown | VmState::Paused  => NodeStatus::Suspended,
        VmState::Crashed                                        => NodeStatus::Error,
        _                                                       => NodeStatus::Unrecognized,
    }
}

/// Node names are `<group>-<suffix>`, so the group is everything before the
/// last dash.
pub fn group_from_name(name: &str) -> Option<String> {
    match name.rsplit_once('-') {
        Some((group, suffix)) if !group.is_empty() && !suffix.is_empty() => Some(group.to_string()),
        _ => None
    }
}

fn is_private_address(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        // fc00::/7 unique local, fe80::/10 link local
        Ok(IpAddr::V6(v6)) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00 || (v6.segments()[0] & 0xffc0) == 0xfe80,
        Err(_) => false
    }
}
