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
use std::str::FromStr;

use crate::common::ProvisionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionActionType {
    NotSet,
    CreateNodes,
    DestroyNode,
    RebootNode,
    SuspendNode,
    ResumeNode,
    Unknown
}

impl fmt::Display for ProvisionActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionActionType::NotSet       => write!(f, "None"),
            ProvisionActionType::CreateNodes  => write!(f, "createNodes"),
            ProvisionActionType::DestroyNode  => write!(f, "destroyNode"),
            ProvisionActionType::RebootNode   => write!(f, "rebootNode"),
            ProvisionActionType::SuspendNode  => write!(f, "suspendNode"),
            ProvisionActionType::ResumeNode   => write!(f, "resumeNode"),
            ProvisionActionType::Unknown      => write!(f, "Unknown")
        }
    }
}

impl From<&str> for ProvisionActionType {
    fn from(val: &str) -> Self {
        match val {
            "createNodes" | "createNode" | "createInstance" => ProvisionActionType::CreateNodes,
            "destroyNode" | "deleteInstance"                => ProvisionActionType::DestroyNode,
            "rebootNode"                                    => ProvisionActionType::RebootNode,
            "suspendNode"                                   => ProvisionActionType::SuspendNode,
            "resumeNode"                                    => ProvisionActionType::ResumeNode,
            _                                               => ProvisionActionType::Unknown
        }
    }
}

/// Nodes are addressed as `<dataCenterId>/<serverId>`, as servers only
/// exist within the scope of a data center.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub data_center_id:     String,
    pub server_id:          String,
}

impl NodeId {
    pub fn new(data_center_id: &str, server_id: &str) -> NodeId {
        NodeId { data_center_id: data_center_id.to_string(), server_id: server_id.to_string() }
    }
}

impl FromStr for NodeId {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((dc, server)) if !dc.is_empty() && !server.is_empty() && !server.contains('/') => {
                Ok(NodeId::new(dc, server))
            },
            _ => Err(ProvisionError::InvalidNodeId(s.to_string()))
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.data_center_id, self.server_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Pending,
    Running,
    Suspended,
    Terminated,
    Error,
    Unrecognized
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str_val = match self {
            NodeStatus::Pending      => "pending",
            NodeStatus::Running      => "running",
            NodeStatus::Suspended    => "suspended",
            NodeStatus::Terminated   => "terminated",
            NodeStatus::Error        => "error",
            NodeStatus::Unrecognized => "unrecognized",
        };
        write!(f, "{}", str_val)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeMetadata {
    pub id:             NodeId,
    pub name:           String,
    pub group:          Option<String>,
    pub location:       String,
    pub status:         NodeStatus,
    pub cores:          u32,
    pub ram_mb:         u32,
    pub volume_sizes:   Vec<u32>,
    pub image_id:       Option<String>,
    pub public_ips:     Vec<String>,
    pub private_ips:    Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoginCredentials {
    pub user:           String,
    pub password:       Option<String>,
}

#[derive(Clone, Debug)]
pub struct NodeAndInitialCredentials {
    pub node_id:        NodeId,
    pub node:           NodeMetadata,
    pub credentials:    LoginCredentials,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationInfo {
    pub id:             String,
    pub name:           String,
    pub region:         String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Image,
    Snapshot,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Image    => write!(f, "image"),
            ImageKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageInfo {
    pub id:             String,
    pub name:           String,
    pub kind:           ImageKind,
    pub location:       Option<String>,
    pub os_family:      Option<String>,
    pub size_gb:        Option<f32>,
}
