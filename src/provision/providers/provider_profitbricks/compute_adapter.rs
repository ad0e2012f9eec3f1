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

use std::collections::BTreeSet;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::common::ProvisionError;
use crate::provision::polling::PollingConfig;
use crate::provision::provision_common::{ImageInfo, ImageKind, LocationInfo, LoginCredentials};
use crate::provision::provision_common::{NodeAndInitialCredentials, NodeId, NodeMetadata, ProvisionActionType};
use crate::provision::provision_params::ProvisionParams;
use crate::provision::provision_provider::ProvisionProvider;
use crate::provision::template::Template;

use super::api::ProfitBricksApi;
use super::domain::{CreateFirewallRule, CreateLan, CreateNic, CreateServer, CreateVolume, DataCenter};
use super::domain::{Image, ResourceRef, Server, Snapshot, VmState};
use super::node_metadata::server_to_node_metadata;
use super::predicates::Waiter;

pub const PROVIDER_NAME: &str = "profitbricks";

const VOLUME_TYPE: &str = "HDD";
// data volumes carry no image, so the API wants a licence type instead
const DATA_VOLUME_LICENCE: &str = "OTHER";
const IMAGE_TYPE_HDD: &str = "HDD";
const FIREWALL_PROTOCOL: &str = "TCP";
const PASSWORD_LENGTH: usize = 12;

/// What has been created so far for a node, so a failure part way through
/// knows what to tear down.
struct ProvisionedResources {
    volume_ids:         Vec<String>,
    // volumes are attached in order, so this is a prefix of volume_ids
    attached_volumes:   usize,
    server_id:          Option<String>,
}

pub struct ProfitBricksComputeServiceAdapter<A: ProfitBricksApi> {
    api:        A,
    polling:    PollingConfig,
}

impl<A: ProfitBricksApi> ProfitBricksComputeServiceAdapter<A> {
    pub fn new(api: A, polling: PollingConfig) -> ProfitBricksComputeServiceAdapter<A> {
        ProfitBricksComputeServiceAdapter { api, polling }
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    fn waiter(&self) -> Waiter<'_, A> {
        Waiter::new(&self.api, &self.polling)
    }

    /// A data center id, or a region like "de/fra" holding exactly one data
    /// center.
    fn resolve_data_center(&self, location: &str) -> Result<DataCenter, ProvisionError> {
        if let Some(dc) = self.api.get_data_center(location)? {
            return Ok(dc);
        }

        if !self.api.list_locations()?.iter().any(|region| region.id == location) {
            return Err(ProvisionError::NotFound(format!("data center or region '{}'", location)));
        }

        let mut in_region: Vec<DataCenter> = self.api.list_data_centers()?.into_iter()
            .filter(|dc| dc.properties.location == location)
            .collect();

        match in_region.len() {
            0 => Err(ProvisionError::NotFound(format!("no data center in region '{}'", location))),
            1 => Ok(in_region.remove(0)),
            _ => {
                let ids: Vec<String> = in_region.into_iter().map(|dc| dc.id).collect();
                Err(ProvisionError::InvalidTemplate(
                    format!("region '{}' has several data centers, use one of: {}", location, ids.join(", "))))
            }
        }
    }

    fn resolve_image(&self, image_id: &str) -> Result<ImageInfo, ProvisionError> {
        if let Some(image) = self.api.get_image(image_id)? {
            return Ok(image_to_info(&image));
        }
        if let Some(snapshot) = self.api.get_snapshot(image_id)? {
            return Ok(snapshot_to_info(&snapshot));
        }

        Err(ProvisionError::NotFound(format!("image or snapshot '{}'", image_id)))
    }

    // waits for the data center and then the server to stop being busy
    fn settle(&self, data_center_id: &str, server_id: &str) -> Result<(), ProvisionError> {
        let waiter = self.waiter();
        waiter.data_center_available(data_center_id)?;
        waiter.server_available(data_center_id, server_id)
    }

    fn provision_node(&self, name: &str, template: &Template, password: &str,
                      resources: &mut ProvisionedResources) -> Result<Server, ProvisionError> {
        let dc = template.location.id.as_str();
        let hardware = &template.hardware;
        let options = &template.options;
        let waiter = self.waiter();

        // volumes first, the server needs its boot volume to exist
        for (index, volume) in hardware.volumes.iter().enumerate() {
            let mut create = CreateVolume { name: format!("{}-disk-{}", name, index + 1), size: volume.size_gb,
                                            volume_type: VOLUME_TYPE.to_string(), image: None, image_password: None,
                                            ssh_keys: Vec::new(), licence_type: None };
            if index == 0 {
                create.image = Some(template.image.id.clone());
                // snapshots already have their credentials baked in
                if template.image.kind == ImageKind::Image {
                    create.image_password = Some(password.to_string());
                    create.ssh_keys = options.public_key.iter().cloned().collect();
                }
            }
            else {
                create.licence_type = Some(DATA_VOLUME_LICENCE.to_string());
            }

            tracing::debug!("Creating volume '{}' ({} GB)", create.name, create.size);
            let tracked = self.api.create_volume(dc, &create)?;
            resources.volume_ids.push(tracked.value.id.clone());
            waiter.request_completed(tracked.request.as_ref())?;
        }

        let boot_volume_id = resources.volume_ids[0].clone();
        waiter.volume_available(dc, &boot_volume_id)?;
        waiter.data_center_available(dc)?;

        tracing::debug!("Creating server '{}' with boot volume {}", name, boot_volume_id);
        let create = CreateServer { name: name.to_string(), cores: hardware.cores, ram: hardware.ram_mb,
                                    boot_volume: ResourceRef { id: boot_volume_id.clone() } };
        let tracked = self.api.create_server(dc, &create)?;
        let server_id = tracked.value.id.clone();
        resources.server_id = Some(server_id.clone());
        waiter.request_completed(tracked.request.as_ref())?;
        waiter.server_available(dc, &server_id)?;
        waiter.data_center_available(dc)?;

        self.attach_volume(dc, &server_id, &boot_volume_id)?;
        resources.attached_volumes = 1;

        let lan_id = match options.network {
            Some(lan_id) => lan_id,
            None => self.resolve_public_lan(dc, name)?,
        };

        tracing::debug!("Creating NIC for server {} on LAN {}", server_id, lan_id);
        let create = CreateNic { name: format!("{}-nic", name), dhcp: true, lan: lan_id,
                                 firewall_active: !options.inbound_ports.is_empty() };
        let nic = self.api.create_nic(dc, &server_id, &create)?;
        let nic_id = nic.value.id.clone();
        waiter.request_completed(nic.request.as_ref())?;
        waiter.nic_available(dc, &server_id, &nic_id)?;
        self.settle(dc, &server_id)?;

        for ports in &options.inbound_ports {
            tracing::debug!("Opening TCP {} on NIC {}", ports, nic_id);
            let create = CreateFirewallRule { name: format!("{}-tcp-{}", name, ports), protocol: FIREWALL_PROTOCOL.to_string(),
                                              port_range_start: ports.start, port_range_end: ports.end };
            let rule = self.api.create_firewall_rule(dc, &server_id, &nic_id, &create)?;
            waiter.request_completed(rule.request.as_ref())?;
        }

        let remaining: Vec<String> = resources.volume_ids[1..].to_vec();
        for volume_id in remaining {
            self.attach_volume(dc, &server_id, &volume_id)?;
            resources.attached_volumes += 1;
        }

        self.settle(dc, &server_id)?;

        self.api.get_server(dc, &server_id)?
            .ok_or_else(|| ProvisionError::NotFound(format!("server {} vanished after provisioning", server_id)))
    }

    fn attach_volume(&self, data_center_id: &str, server_id: &str, volume_id: &str) -> Result<(), ProvisionError> {
        tracing::debug!("Attaching volume {} to server {}", volume_id, server_id);
        let waiter = self.waiter();
        let tracked = self.api.attach_volume(data_center_id, server_id, volume_id)?;
        waiter.request_completed(tracked.request.as_ref())?;
        waiter.volume_available(data_center_id, volume_id)?;
        self.settle(data_center_id, server_id)
    }

    /// The first public LAN of the data center, creating one if there's none.
    fn resolve_public_lan(&self, data_center_id: &str, name: &str) -> Result<u32, ProvisionError> {
        let lans = self.api.list_lans(data_center_id)?;
        let lan_id = match lans.into_iter().find(|lan| lan.properties.public) {
            Some(lan) => lan.id,
            None => {
                tracing::info!("No public LAN in data center {}, creating one", data_center_id);
                let tracked = self.api.create_lan(data_center_id, &CreateLan { name: format!("lan {}", name), public: true })?;
                self.waiter().request_completed(tracked.request.as_ref())?;
                tracked.value.id
            }
        };

        lan_id.parse::<u32>()
            .map_err(|_| ProvisionError::Parse(format!("non-numeric LAN id '{}'", lan_id)))
    }

    /// Tears down whatever was created for a failed node: the volume that
    /// was being attached, the server, the other unattached volumes and then
    /// the ones the server had. Failures here are only logged, the caller
    /// reports the original error.
    fn rollback(&self, data_center_id: &str, resources: &ProvisionedResources) {
        let (attached, unattached) = resources.volume_ids.split_at(resources.attached_volumes);
        let (orphaned, pending) = unattached.split_at(unattached.len().min(1));

        let server_id = match &resources.server_id {
            Some(server_id) => server_id,
            None => {
                for volume_id in unattached {
                    tracing::warn!("Deleting volume {}", volume_id);
                    self.destroy_volume_best_effort(data_center_id, volume_id);
                }
                return;
            }
        };

        for volume_id in orphaned {
            tracing::warn!("Deleting orphaned volume {}", volume_id);
            self.destroy_volume_best_effort(data_center_id, volume_id);
        }

        tracing::warn!("Rolling back server {}", server_id);
        if let Err(err) = self.destroy_server(data_center_id, server_id) {
            tracing::error!("Failed to roll back server {}: {}", server_id, err);
        }

        for volume_id in pending.iter().chain(attached) {
            tracing::warn!("Deleting volume {}", volume_id);
            self.destroy_volume_best_effort(data_center_id, volume_id);
        }
    }

    fn destroy_server(&self, data_center_id: &str, server_id: &str) -> Result<(), ProvisionError> {
        let waiter = self.waiter();
        let request = self.api.delete_server(data_center_id, server_id)?;
        waiter.request_completed(request.as_ref())?;
        waiter.data_center_available(data_center_id)
    }

    fn destroy_volume_best_effort(&self, data_center_id: &str, volume_id: &str) {
        let res = self.api.delete_volume(data_center_id, volume_id).and_then(|request| {
            let waiter = self.waiter();
            waiter.request_completed(request.as_ref())?;
            waiter.data_center_available(data_center_id)
        });

        if let Err(err) = res {
            tracing::error!("Failed to delete volume {}: {}", volume_id, err);
        }
    }

    fn existing_server(&self, id: &NodeId) -> Result<Server, ProvisionError> {
        self.api.get_server(&id.data_center_id, &id.server_id)?
            .ok_or_else(|| ProvisionError::NotFound(format!("node {}", id)))
    }
}

impl<A: ProfitBricksApi> ProvisionProvider for ProfitBricksComputeServiceAdapter<A> {
    fn name(&self) -> String {
        PROVIDER_NAME.to_string()
    }

    fn get_required_params_for_action(&self, action: ProvisionActionType) -> BTreeSet<&str> {
        let mut params = BTreeSet::new();
        match action {
            ProvisionActionType::CreateNodes => {
                params.insert("location");
                params.insert("image");
            },
            ProvisionActionType::DestroyNode | ProvisionActionType::RebootNode |
            ProvisionActionType::SuspendNode | ProvisionActionType::ResumeNode => {
                params.insert("node_id");
            },
            _ => {}
        }
        params
    }

    fn list_locations(&self) -> Result<Vec<LocationInfo>, ProvisionError> {
        let data_centers = self.api.list_data_centers()?;
        Ok(data_centers.iter().map(data_center_to_location).collect())
    }

    fn list_images(&self) -> Result<Vec<ImageInfo>, ProvisionError> {
        // CD-ROM images can't be booted from a volume
        let mut images: Vec<ImageInfo> = self.api.list_images()?.iter()
            .filter(|image| image.properties.image_type.as_deref() == Some(IMAGE_TYPE_HDD))
            .map(image_to_info)
            .collect();

        images.extend(self.api.list_snapshots()?.iter().map(snapshot_to_info));
        Ok(images)
    }

    fn list_nodes(&self) -> Result<Vec<NodeMetadata>, ProvisionError> {
        let mut nodes = Vec::new();
        for dc in self.api.list_data_centers()? {
            for server in self.api.list_servers(&dc.id)? {
                nodes.push(server_to_node_metadata(&dc.id, &dc.properties.location, &server));
            }
        }
        Ok(nodes)
    }

    fn list_nodes_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeMetadata>, ProvisionError> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.get_node(id)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<NodeMetadata>, ProvisionError> {
        let dc = match self.api.get_data_center(&id.data_center_id)? {
            Some(dc) => dc,
            None => return Ok(None),
        };

        let server = self.api.get_server(&dc.id, &id.server_id)?;
        Ok(server.map(|server| server_to_node_metadata(&dc.id, &dc.properties.location, &server)))
    }

    fn resolve_template(&self, params: &ProvisionParams) -> Result<Template, ProvisionError> {
        let location_id = params.get_string("location")
            .ok_or_else(|| ProvisionError::MissingParams(vec!["location".to_string()]))?;
        let image_id = params.get_string("image")
            .ok_or_else(|| ProvisionError::MissingParams(vec!["image".to_string()]))?;

        let dc = self.resolve_data_center(&location_id)?;
        let image = self.resolve_image(&image_id)?;

        if let Some(image_location) = &image.location {
            if image_location != &dc.properties.location {
                return Err(ProvisionError::InvalidTemplate(
                    format!("{} '{}' is in {}, but data center {} is in {}",
                            image.kind, image.id, image_location, dc.id, dc.properties.location)));
            }
        }

        let hardware = params.hardware()?;
        if let (Some(image_size), Some(boot_volume)) = (image.size_gb, hardware.boot_volume()) {
            let boot_size = boot_volume.size_gb;
            if (boot_size as f32) < image_size {
                return Err(ProvisionError::InvalidTemplate(
                    format!("boot volume of {} GB is smaller than {} '{}' ({} GB)", boot_size, image.kind, image.id, image_size)));
            }
        }

        let options = params.template_options()?;

        Ok(Template { location: data_center_to_location(&dc), image, hardware, options })
    }

    fn create_node(&self, _group: &str, name: &str, template: &Template) -> Result<NodeAndInitialCredentials, ProvisionError> {
        let dc = template.location.id.as_str();
        template.hardware.validate()?;
        let password = template.options.login_password.clone().unwrap_or_else(generate_password);

        tracing::info!("Provisioning node '{}' in data center {} with {} from {} '{}'",
                       name, dc, template.hardware, template.image.kind, template.image.id);

        let mut resources = ProvisionedResources { volume_ids: Vec::new(), attached_volumes: 0, server_id: None };
        let server = match self.provision_node(name, template, &password, &mut resources) {
            Ok(server) => server,
            Err(err) => {
                tracing::error!("Failed to provision node '{}': {}", name, err);
                self.rollback(dc, &resources);
                return Err(err);
            }
        };

        let node = server_to_node_metadata(dc, &template.location.region, &server);
        tracing::info!("Node {} ('{}') is ready", node.id, name);

        // a snapshot keeps whatever password it was taken with
        let password = match template.image.kind {
            ImageKind::Image => Some(password),
            ImageKind::Snapshot => template.options.login_password.clone(),
        };
        let credentials = LoginCredentials { user: template.options.login_user.clone(), password };

        Ok(NodeAndInitialCredentials { node_id: node.id.clone(), node, credentials })
    }

    fn destroy_node(&self, id: &NodeId) -> Result<(), ProvisionError> {
        let server = match self.api.get_server(&id.data_center_id, &id.server_id)? {
            Some(server) => server,
            None => {
                tracing::info!("Node {} doesn't exist, nothing to destroy", id);
                return Ok(());
            }
        };

        for volume in &server.entities.volumes.items {
            tracing::debug!("Deleting volume {} of node {}", volume.id, id);
            self.destroy_volume_best_effort(&id.data_center_id, &volume.id);
        }

        self.destroy_server(&id.data_center_id, &id.server_id)?;
        tracing::info!("Destroyed node {}", id);
        Ok(())
    }

    fn reboot_node(&self, id: &NodeId) -> Result<(), ProvisionError> {
        let waiter = self.waiter();
        let request = self.api.reboot_server(&id.data_center_id, &id.server_id)?;
        waiter.request_completed(request.as_ref())?;
        waiter.server_available(&id.data_center_id, &id.server_id)?;
        waiter.server_running(&id.data_center_id, &id.server_id)
    }

    fn resume_node(&self, id: &NodeId) -> Result<(), ProvisionError> {
        let server = self.existing_server(id)?;
        if server.properties.vm_state == VmState::Running {
            tracing::info!("Node {} is already running", id);
            return Ok(());
        }

        let waiter = self.waiter();
        let request = self.api.start_server(&id.data_center_id, &id.server_id)?;
        waiter.request_completed(request.as_ref())?;
        waiter.server_running(&id.data_center_id, &id.server_id)
    }

    fn suspend_node(&self, id: &NodeId) -> Result<(), ProvisionError> {
        let server = self.existing_server(id)?;
        if server.properties.vm_state == VmState::Shutoff {
            tracing::info!("Node {} is already suspended", id);
            return Ok(());
        }

        let waiter = self.waiter();
        let request = self.api.stop_server(&id.data_center_id, &id.server_id)?;
        waiter.request_completed(request.as_ref())?;
        waiter.server_suspended(&id.data_center_id, &id.server_id)
    }
}

fn data_center_to_location(dc: &DataCenter) -> LocationInfo {
    LocationInfo { id: dc.id.clone(), name: dc.properties.name.clone(), region: dc.properties.location.clone() }
}

fn image_to_info(image: &Image) -> ImageInfo {
    ImageInfo { id: image.id.clone(), name: image.properties.name.clone(), kind: ImageKind::Image,
                location: image.properties.location.clone(),
                os_family: image.properties.licence_type.as_ref().map(|l| l.to_ascii_lowercase()),
                size_gb: image.properties.size }
}

fn snapshot_to_info(snapshot: &Snapshot) -> ImageInfo {
    ImageInfo { id: snapshot.id.clone(), name: snapshot.properties.name.clone(), kind: ImageKind::Snapshot,
                location: snapshot.properties.location.clone(),
                os_family: snapshot.properties.licence_type.as_ref().map(|l| l.to_ascii_lowercase()),
                size_gb: snapshot.properties.size }
}

/// Alphanumeric only, with at least one lowercase, uppercase and digit, which
/// keeps the image password rules happy.
pub fn generate_password() -> String {
    loop {
        let candidate: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LENGTH)
            .map(char::from)
            .collect();

        if candidate.chars().any(|c| c.is_ascii_lowercase()) &&
           candidate.chars().any(|c| c.is_ascii_uppercase()) &&
           candidate.chars().any(|c| c.is_ascii_digit()) {
            return candidate;
        }
    }
}
