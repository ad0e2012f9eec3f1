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

use crate::common::ProvisionError;

use super::provision_common::{ImageInfo, LocationInfo, NodeAndInitialCredentials, NodeId, NodeMetadata, ProvisionActionType};
use super::provision_params::ProvisionParams;
use super::template::{hardware_profiles, Hardware, Template};

/// Generic compute lifecycle callbacks, which each provider maps onto its
/// own API.
pub trait ProvisionProvider {

    fn name(&self) -> String;

    fn get_required_params_for_action(&self, _action: ProvisionActionType) -> BTreeSet<&str> {
        BTreeSet::new()
    }

    // listing

    fn list_locations(&self) -> Result<Vec<LocationInfo>, ProvisionError>;

    fn list_images(&self) -> Result<Vec<ImageInfo>, ProvisionError>;

    fn list_hardware_profiles(&self) -> Vec<Hardware> {
        hardware_profiles()
    }

    fn list_nodes(&self) -> Result<Vec<NodeMetadata>, ProvisionError>;

    fn list_nodes_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeMetadata>, ProvisionError> {
        let nodes = self.list_nodes()?;
        Ok(nodes.into_iter().filter(|node| ids.contains(&node.id)).collect())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<NodeMetadata>, ProvisionError>;

    // actual lifecycle items

    fn resolve_template(&self, params: &ProvisionParams) -> Result<Template, ProvisionError>;

    fn create_node(&self, group: &str, name: &str, template: &Template) -> Result<NodeAndInitialCredentials, ProvisionError>;

    fn destroy_node(&self, _id: &NodeId) -> Result<(), ProvisionError> {
        Err(ProvisionError::Unsupported(format!("{} can't destroy nodes", self.name())))
    }

    fn reboot_node(&self, _id: &NodeId) -> Result<(), ProvisionError> {
        Err(ProvisionError::Unsupported(format!("{} can't reboot nodes", self.name())))
    }

    fn resume_node(&self, _id: &NodeId) -> Result<(), ProvisionError> {
        Err(ProvisionError::Unsupported(format!("{} can't resume nodes", self.name())))
    }

    fn suspend_node(&self, _id: &NodeId) -> Result<(), ProvisionError> {
        Err(ProvisionError::Unsupported(format!("{} can't suspend nodes", self.name())))
    }
}
