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

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::{IsTerminal, Write};
use std::str::FromStr;

use rand::Rng;
use rpassword::read_password;

use crate::column_list_printer::{Alignment, ColumnListPrinter};
use crate::common::ProvisionError;

use super::provision_common::{NodeAndInitialCredentials, NodeId, NodeMetadata, ProvisionActionType};
use super::provision_params::ProvisionParams;
use super::provision_provider::ProvisionProvider;

use super::providers::provider_profitbricks::compute_adapter::ProfitBricksComputeServiceAdapter;
use super::providers::provider_profitbricks::config::{ProfitBricksConfig, ENV_PASSWORD};
use super::providers::provider_profitbricks::rest_client::ProfitBricksRestClient;

// random suffix space for generated node names
const NAME_SUFFIX_SPACE: u32 = 0x1000;
const MAX_NAME_ATTEMPTS: usize = 64;

pub struct ProvisionManager {
    registered_providers: Vec<Box<dyn ProvisionProvider> >
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ListType {
    Locations,
    Images,
    Hardware,
    Nodes
}

impl FromStr for ListType {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locations" | "regions"             => Ok(ListType::Locations),
            "images" | "os"                     => Ok(ListType::Images),
            "hardware" | "plans" | "sizes"      => Ok(ListType::Hardware),
            "nodes" | "instances"               => Ok(ListType::Nodes),
            _ => Err(ProvisionError::Unsupported(format!("unknown list type '{}'", s)))
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListType::Locations => write!(f, "locations"),
            ListType::Images    => write!(f, "images"),
            ListType::Hardware  => write!(f, "hardware"),
            ListType::Nodes     => write!(f, "nodes"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum ActionOutcome {
    Created(Vec<NodeAndInitialCredentials>),
    Completed(ProvisionActionType, NodeId),
}

impl ProvisionManager {
    pub fn new() -> ProvisionManager {
        ProvisionManager { registered_providers: Vec::new() }
    }

    /// Configures the providers from the environment, prompting for any
    /// password that wasn't set.
    pub fn with_env_providers() -> Result<ProvisionManager, ProvisionError> {
        let mut manager = ProvisionManager::new();

        let mut config = ProfitBricksConfig::from_env()?;
        if !config.is_complete() {
            if !std::io::stdin().is_terminal() {
                return Err(ProvisionError::NotConfigured(format!("{} is not set", ENV_PASSWORD)));
            }
            config.password = prompt_password(&format!("ProfitBricks password for '{}': ", config.username))?;
        }
        tracing::debug!("Using ProfitBricks endpoint {}", config.endpoint);

        let client = ProfitBricksRestClient::new(&config);
        manager.register(Box::new(ProfitBricksComputeServiceAdapter::new(client, config.polling.clone())));

        Ok(manager)
    }

    pub fn register(&mut self, provider: Box<dyn ProvisionProvider>) {
        self.registered_providers.push(provider);
    }

    pub fn find_provider(&self, provider: &str) -> Result<&dyn ProvisionProvider, ProvisionError> {
        self.registered_providers.iter()
            .find(|prov| prov.name() == provider)
            .map(|prov| prov.as_ref())
            .ok_or_else(|| ProvisionError::NotConfigured(format!("can't find provider '{}'", provider)))
    }

    pub fn list_available(&self, provider: &str, list_type: ListType) -> Result<ColumnListPrinter, ProvisionError> {
        let provider_item = self.find_provider(provider)?;
        tracing::debug!("Listing {} from {}", list_type, provider);

        let clp = match list_type {
            ListType::Locations => {
                let mut clp = ColumnListPrinter::new(3)
                    .add_titles(["id", "name", "region"]);
                for location in provider_item.list_locations()? {
                    clp.add_row_strings(&[&location.id, &location.name, &location.region]);
                }
                clp
            },
            ListType::Images => {
                let mut clp = ColumnListPrinter::new(6)
                    .set_alignment(5, Alignment::Right)
                    .add_titles(["id", "name", "type", "location", "os", "size"]);
                for image in provider_item.list_images()? {
                    let size = image.size_gb.map(|s| format!("{} GB", s)).unwrap_or_default();
                    clp.add_row_strings(&[&image.id, &image.name, &image.kind.to_string(),
                                          image.location.as_deref().unwrap_or(""),
                                          image.os_family.as_deref().unwrap_or(""), &size]);
                }
                clp
            },
            ListType::Hardware => {
                let mut clp = ColumnListPrinter::new(4)
                    .set_alignment_multiple(&[1usize, 2, 3], Alignment::Right)
                    .add_titles(["id", "cores", "ram", "disk"]);
                for hardware in provider_item.list_hardware_profiles() {
                    clp.add_row_strings(&[&hardware.id, &format!("{}", hardware.cores), &format!("{} MB", hardware.ram_mb),
                                          &hardware.boot_volume().map(|vol| format!("{} GB", vol.size_gb)).unwrap_or_default()]);
                }
                clp
            },
            ListType::Nodes => {
                node_table(&provider_item.list_nodes()?)
            }
        };

        Ok(clp)
    }

    /// A single id is looked up directly, several go through one node listing.
    /// Ids that don't exist are left out of the result.
    pub fn get_nodes<S: AsRef<str>>(&self, provider: &str, node_ids: &[S]) -> Result<Vec<NodeMetadata>, ProvisionError> {
        let provider_item = self.find_provider(provider)?;
        let ids = node_ids.iter().map(|id| id.as_ref().parse::<NodeId>()).collect::<Result<Vec<_>, _>>()?;
        match ids.as_slice() {
            [id] => Ok(provider_item.get_node(id)?.into_iter().collect()),
            _ => provider_item.list_nodes_by_ids(&ids),
        }
    }

    pub fn perform_action(&self, params: &ProvisionParams) -> Result<ActionOutcome, ProvisionError> {
        if params.provider.is_empty() {
            return Err(ProvisionError::NotConfigured("provider not specified".to_string()));
        }

        let provider_item = self.find_provider(&params.provider)?;

        let required_params = provider_item.get_required_params_for_action(params.action);
        self.check_required_params_are_provided(params, &required_params)?;

        tracing::debug!("Performing action:\n{}", params);

        match params.action {
            ProvisionActionType::CreateNodes => {
                self.create_nodes(provider_item, params).map(ActionOutcome::Created)
            },
            ProvisionActionType::DestroyNode | ProvisionActionType::RebootNode |
            ProvisionActionType::SuspendNode | ProvisionActionType::ResumeNode => {
                let node_id = params.get_string("node_id")
                    .ok_or_else(|| ProvisionError::MissingParams(vec!["node_id".to_string()]))?
                    .parse::<NodeId>()?;

                match params.action {
                    ProvisionActionType::DestroyNode => provider_item.destroy_node(&node_id)?,
                    ProvisionActionType::RebootNode  => provider_item.reboot_node(&node_id)?,
                    ProvisionActionType::SuspendNode => provider_item.suspend_node(&node_id)?,
                    _                                => provider_item.resume_node(&node_id)?,
                }
                Ok(ActionOutcome::Completed(params.action, node_id))
            },
            ProvisionActionType::NotSet => {
                Err(ProvisionError::MissingParams(vec!["action".to_string()]))
            },
            ProvisionActionType::Unknown => {
                Err(ProvisionError::Unsupported("unrecognised action".to_string()))
            }
        }
    }

    fn create_nodes(&self, provider: &dyn ProvisionProvider, params: &ProvisionParams) -> Result<Vec<NodeAndInitialCredentials>, ProvisionError> {
        let count = params.get_u32("count")?.unwrap_or(1);
        if count == 0 {
            return Err(ProvisionError::InvalidTemplate("'count' must be at least 1".to_string()));
        }

        let explicit_name = params.get_string("name");
        if explicit_name.is_some() && count > 1 {
            return Err(ProvisionError::InvalidTemplate("'name' can only be given when creating a single node".to_string()));
        }

        let group = match (params.get_string("group"), &explicit_name) {
            (Some(group), _) => group,
            (None, Some(name)) => name.clone(),
            (None, None) => return Err(ProvisionError::MissingParams(vec!["group".to_string()])),
        };

        let template = provider.resolve_template(params)?;
        tracing::info!("Creating {} node(s) in group '{}' at {} ({})", count, group, template.location.region, template.hardware);

        let mut used_names: HashSet<String> = match explicit_name {
            Some(_) => HashSet::new(),
            None => provider.list_nodes()?.into_iter().map(|node| node.name).collect(),
        };

        let mut created = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = match &explicit_name {
                Some(name) => name.clone(),
                None => unique_node_name(&group, &used_names)?,
            };
            used_names.insert(name.clone());

            match provider.create_node(&group, &name, &template) {
                Ok(node) => created.push(node),
                Err(err) => {
                    if !created.is_empty() {
                        let ids: Vec<String> = created.iter().map(|n| n.node_id.to_string()).collect();
                        tracing::warn!("Stopping after failing to create '{}', nodes already created: {}", name, ids.join(", "));
                    }
                    return Err(err);
                }
            }
        }

        Ok(created)
    }

    fn check_required_params_are_provided(&self, params: &ProvisionParams, required_params: &BTreeSet<&str>) -> Result<(), ProvisionError> {
        let missing_params: Vec<String> = required_params.iter()
            .filter(|required| !params.has_param(required))
            .map(|required| required.to_string())
            .collect();

        if !missing_params.is_empty() {
            tracing::error!("Required params are missing for the '{}' provider to perform the '{}' action: {}",
                            params.provider, params.action, missing_params.join(", "));
            return Err(ProvisionError::MissingParams(missing_params));
        }

        Ok(())
    }
}

/// `<group>-<3 hex digits>`, not clashing with anything in `used`.
fn unique_node_name(group: &str, used: &HashSet<String>) -> Result<String, ProvisionError> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = format!("{}-{:03x}", group, rng.gen_range(0..NAME_SUFFIX_SPACE));
        if !used.contains(&name) {
            return Ok(name);
        }
    }

    Err(ProvisionError::InvalidTemplate(format!("couldn't find a free node name in group '{}'", group)))
}

fn prompt_password(prompt: &str) -> Result<String, ProvisionError> {
    print!("{}", prompt);
    std::io::stdout().flush()
        .and_then(|_| read_password())
        .map_err(|e| ProvisionError::NotConfigured(format!("couldn't read password: {}", e)))
}

pub fn node_table(nodes: &[NodeMetadata]) -> ColumnListPrinter {
    let mut clp = ColumnListPrinter::new(7)
        .set_alignment_multiple(&[4usize, 5], Alignment::Right)
        .add_titles(["id", "name", "location", "status", "cores", "ram", "public ips"]);
    for node in nodes {
        clp.add_row_strings(&[&node.id.to_string(), &node.name, &node.location, &node.status.to_string(),
                              &format!("{}", node.cores), &format!("{} MB", node.ram_mb), &node.public_ips.join(",")]);
    }
    clp
}

pub fn created_nodes_table(nodes: &[NodeAndInitialCredentials]) -> ColumnListPrinter {
    let mut clp = ColumnListPrinter::new(5)
        .add_titles(["id", "name", "public ips", "user", "password"]);
    for created in nodes {
        clp.add_row_strings(&[&created.node_id.to_string(), &created.node.name, &created.node.public_ips.join(","),
                              &created.credentials.user, created.credentials.password.as_deref().unwrap_or("")]);
    }
    clp
}
