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

use super::provision_common::{ImageInfo, LocationInfo};

pub const MIN_RAM_MB: u32 = 256;
pub const RAM_GRANULARITY_MB: u32 = 256;

const PROFILE_MAX_CORES: u32 = 8;
const PROFILE_MIN_RAM_MB: u32 = 1024;
const PROFILE_MAX_RAM_MB: u32 = 8192;
const PROFILE_RAM_STEP_MB: u32 = 1024;
const PROFILE_MIN_DISK_GB: u32 = 10;
const PROFILE_MAX_DISK_GB: u32 = 210;
const PROFILE_DISK_STEP_GB: u32 = 50;

#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpec {
    pub size_gb:    u32,
}

/// The first volume is always the boot volume.
#[derive(Clone, Debug, PartialEq)]
pub struct Hardware {
    pub id:         String,
    pub cores:      u32,
    pub ram_mb:     u32,
    pub volumes:    Vec<VolumeSpec>,
}

impl Hardware {
    pub fn new(cores: u32, ram_mb: u32, disk_sizes: &[u32]) -> Result<Hardware, ProvisionError> {
        let volumes: Vec<VolumeSpec> = disk_sizes.iter().map(|size| VolumeSpec { size_gb: *size }).collect();
        let mut hardware = Hardware { id: String::new(), cores, ram_mb, volumes };
        hardware.validate()?;
        hardware.id = hardware.spec_string();
        Ok(hardware)
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.cores == 0 {
            return Err(ProvisionError::InvalidTemplate("hardware needs at least one core".to_string()));
        }
        if self.ram_mb < MIN_RAM_MB || self.ram_mb % RAM_GRANULARITY_MB != 0 {
            return Err(ProvisionError::InvalidTemplate(
                format!("ram must be at least {} MB and a multiple of {} MB, got {}", MIN_RAM_MB, RAM_GRANULARITY_MB, self.ram_mb)));
        }
        if self.volumes.is_empty() {
            return Err(ProvisionError::InvalidTemplate("hardware needs at least one (boot) volume".to_string()));
        }
        if self.volumes.iter().any(|vol| vol.size_gb == 0) {
            return Err(ProvisionError::InvalidTemplate("volume sizes must be at least 1 GB".to_string()));
        }
        Ok(())
    }

    fn spec_string(&self) -> String {
        let mut spec = format!("cpu={},ram={}", self.cores, self.ram_mb);
        for vol in &self.volumes {
            spec.push_str(&format!(",disk={}", vol.size_gb));
        }
        spec
    }

    pub fn boot_volume(&self) -> Option<&VolumeSpec> {
        self.volumes.first()
    }
}

impl FromStr for Hardware {
    type Err = ProvisionError;

    /// Parses ids of the form `cpu=2,ram=2048,disk=40[,disk=100...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cores = None;
        let mut ram = None;
        let mut disks = Vec::new();

        for item in s.split(',').map(|it| it.trim()).filter(|it| !it.is_empty()) {
            let (key, val) = item.split_once('=')
                .ok_or_else(|| ProvisionError::InvalidTemplate(format!("malformed hardware spec item: '{}'", item)))?;
            let val = val.trim().parse::<u32>()
                .map_err(|_| ProvisionError::InvalidTemplate(format!("non-numeric value in hardware spec item: '{}'", item)))?;

            match key.trim() {
                "cpu" | "cores" => cores = Some(val),
                "ram"           => ram = Some(val),
                "disk"          => disks.push(val),
                other => {
                    return Err(ProvisionError::InvalidTemplate(format!("unknown hardware spec key: '{}'", other)));
                }
            }
        }

        let cores = cores.ok_or_else(|| ProvisionError::InvalidTemplate(format!("hardware spec '{}' has no cpu", s)))?;
        let ram = ram.ok_or_else(|| ProvisionError::InvalidTemplate(format!("hardware spec '{}' has no ram", s)))?;

        Hardware::new(cores, ram, &disks)
    }
}

impl fmt::Display for Hardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// The fixed set of hardware profiles offered for selection. ProfitBricks
/// lets you pick any combination, so this is just a convenient grid.
pub fn hardware_profiles() -> Vec<Hardware> {
    let mut profiles = Vec::new();
    for cores in 1..=PROFILE_MAX_CORES {
        for ram_mb in (PROFILE_MIN_RAM_MB..=PROFILE_MAX_RAM_MB).step_by(PROFILE_RAM_STEP_MB as usize) {
            for disk in (PROFILE_MIN_DISK_GB..=PROFILE_MAX_DISK_GB).step_by(PROFILE_DISK_STEP_GB as usize) {
                let volumes = vec![VolumeSpec { size_gb: disk }];
                let mut hardware = Hardware { id: String::new(), cores, ram_mb, volumes };
                hardware.id = hardware.spec_string();
                profiles.push(hardware);
            }
        }
    }
    profiles
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortRange {
    pub start:      u16,
    pub end:        u16,
}

impl FromStr for PortRange {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_port = |val: &str| -> Result<u16, ProvisionError> {
            match val.trim().parse::<u16>() {
                Ok(port) if port > 0 => Ok(port),
                _ => Err(ProvisionError::InvalidTemplate(format!("invalid port in '{}'", s)))
            }
        };

        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (parse_port(start)?, parse_port(end)?),
            None => {
                let port = parse_port(s)?;
                (port, port)
            }
        };

        if start > end {
            return Err(ProvisionError::InvalidTemplate(format!("port range '{}' starts after it ends", s)));
        }

        Ok(PortRange { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        }
        else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateOptions {
    pub login_user:         String,
    pub login_password:     Option<String>,
    pub public_key:         Option<String>,
    pub inbound_ports:      Vec<PortRange>,
    // LAN id to put the NIC on, otherwise the data center's public LAN is used
    pub network:            Option<u32>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        TemplateOptions { login_user: "root".to_string(), login_password: None, public_key: None,
                          inbound_ports: Vec::new(), network: None }
    }
}

/// Everything needed to create a node: the data center it goes in, what to
/// boot, how big it is, and how it is reached.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub location:   LocationInfo,
    pub image:      ImageInfo,
    pub hardware:   Hardware,
    pub options:    TemplateOptions,
}
