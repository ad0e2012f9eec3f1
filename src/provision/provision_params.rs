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

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;

use yaml_rust::{Yaml, YamlLoader};

use crate::common::{FileLoadError, ProvisionError};
use crate::params::ParamValue;

use super::provision_common::ProvisionActionType;
use super::template::{Hardware, PortRange, TemplateOptions};

#[derive(Clone, Debug)]
pub struct ProvisionParams {
    pub provider:   String,
    pub action:     ProvisionActionType,
    pub values:     BTreeMap<String, ParamValue>
}

impl fmt::Display for ProvisionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Provider: {}, Action: {}", self.provider, self.action)?;
        writeln!(f, " params ({}): {{", self.values.len())?;
        for (param, value) in &self.values {
            // don't print secrets to the terminal
            if param.contains("password") {
                writeln!(f, "  {}: ********", param)?;
            }
            else {
                writeln!(f, "  {}: {}", param, value)?;
            }
        }
        writeln!(f, " }}")
    }
}

impl ProvisionParams {
    pub fn new() -> ProvisionParams {
        ProvisionParams { provider: String::new(), action: ProvisionActionType::NotSet, values: BTreeMap::new() }
    }

    pub fn from_details(provider: &str, action: ProvisionActionType) -> ProvisionParams {
        ProvisionParams { provider: provider.to_string(), action, values: BTreeMap::new() }
    }

    pub fn from_file(path: &str) -> Result<ProvisionParams, FileLoadError> {
        let extension = Path::new(&path).extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt"           => ProvisionParams::from_file_txt(path),
            "yaml" | "yml"  => ProvisionParams::from_file_yaml(path),
            _               => Err(FileLoadError::CustomError(format!("Unknown file type for params file: {}", path)))
        }
    }

    fn from_file_txt(path: &str) -> Result<ProvisionParams, FileLoadError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);

        let mut provision_params = ProvisionParams::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            // ignore empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // only split on the first ':', as values (keys, URLs) can contain them
            match line.split_once(':') {
                Some((key, val)) => {
                    provision_params.ingest_param(key.trim(), ParamValue::Str(val.trim().to_string()));
                },
                None => {
                    tracing::warn!("Ignoring unexpected line {} in params file {}: '{}'", line_num + 1, path, line);
                }
            }
        }

        Ok(provision_params)
    }

    fn from_file_yaml(path: &str) -> Result<ProvisionParams, FileLoadError> {
        let contents = std::fs::read_to_string(path)?;
        ProvisionParams::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<ProvisionParams, FileLoadError> {
        let docs = YamlLoader::load_from_str(contents)?;
        let doc = docs.into_iter().next()
            .ok_or_else(|| FileLoadError::CustomError("Empty YAML params document.".to_string()))?;

        let hash = match doc {
            Yaml::Hash(hash) => hash,
            _ => return Err(FileLoadError::CustomError("YAML params document must be a map of key/values.".to_string()))
        };

        let mut provision_params = ProvisionParams::new();
        for (key, val) in hash {
            match key {
                Yaml::String(key_string) => provision_params.ingest_param(&key_string, ParamValue::from(val)),
                other => tracing::warn!("Ignoring non-string key in YAML params: {:?}", other),
            }
        }

        Ok(provision_params)
    }

    pub fn ingest_param(&mut self, key: &str, val: ParamValue) {
        match key {
            "provider" => {
                self.provider = val.as_string().unwrap_or_default();
            },
            "action" => {
                self.action = val.as_string()
                    .map(|action| ProvisionActionType::from(action.as_str()))
                    .unwrap_or(ProvisionActionType::Unknown);
            }
            _ => {
                self.values.insert(key.to_string(), val);
            }
        }
    }

    pub fn set_string(&mut self, key: &str, val: &str) {
        self.values.insert(key.to_string(), ParamValue::Str(val.to_string()));
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(|v| v.as_string()).filter(|v| !v.is_empty())
    }

    pub fn get_string_value(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ProvisionError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(val) => {
                val.as_u32().map(Some)
                    .ok_or_else(|| ProvisionError::InvalidTemplate(format!("'{}' must be a positive whole number, got {}", key, val)))
            }
        }
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.values.get(key).map(|v| v.as_string_list()).unwrap_or_default()
    }

    /// Either a full `hardware` spec id, or separate `cores`, `ram` and
    /// `disks` values.
    pub fn hardware(&self) -> Result<Hardware, ProvisionError> {
        if let Some(spec) = self.get_string("hardware") {
            return spec.parse::<Hardware>();
        }

        let mut missing = Vec::new();
        let cores = self.get_u32("cores")?;
        let ram = self.get_u32("ram")?;
        let disks = self.get_string_list("disks");
        if cores.is_none() {
            missing.push("cores".to_string());
        }
        if ram.is_none() {
            missing.push("ram".to_string());
        }
        if disks.is_empty() {
            missing.push("disks".to_string());
        }
        if !missing.is_empty() {
            return Err(ProvisionError::InvalidTemplate(
                format!("no 'hardware' spec given, and missing: {}", missing.join(", "))));
        }

        let mut disk_sizes = Vec::with_capacity(disks.len());
        for disk in &disks {
            let size = disk.parse::<u32>()
                .map_err(|_| ProvisionError::InvalidTemplate(format!("invalid disk size: '{}'", disk)))?;
            disk_sizes.push(size);
        }

        Hardware::new(cores.unwrap_or_default(), ram.unwrap_or_default(), &disk_sizes)
    }

    pub fn template_options(&self) -> Result<TemplateOptions, ProvisionError> {
        let mut options = TemplateOptions::default();

        options.login_user = self.get_string_value("login_user", &options.login_user);
        options.login_password = self.get_string("login_password");

        options.public_key = match (self.get_string("public_key"), self.get_string("public_key_file")) {
            (Some(key), _) => Some(key),
            (None, Some(path)) => {
                let key = std::fs::read_to_string(&path)
                    .map_err(|e| ProvisionError::InvalidTemplate(format!("can't read public key file '{}': {}", path, e)))?;
                Some(key.trim().to_string())
            },
            (None, None) => None
        };

        for port in self.get_string_list("inbound_ports") {
            options.inbound_ports.push(port.parse::<PortRange>()?);
        }

        options.network = self.get_u32("network")?;

        Ok(options)
    }
}
