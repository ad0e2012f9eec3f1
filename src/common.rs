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

use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FileLoadError {
    #[error("{0}")]
    CustomError(String),
    #[error("yaml error: {0}")]
    YamlError(String),
    #[error("io error: {0}")]
    IOError(#[from] io::Error),
}

impl From<yaml_rust::ScanError> for FileLoadError {
    fn from(error: yaml_rust::ScanError) -> Self {
        FileLoadError::YamlError(error.to_string())
    }
}

/// Everything that can go wrong while talking to a provider or orchestrating
/// a provisioning run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("missing required params: {}", .0.join(", "))]
    MissingParams(Vec<String>),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("invalid node id '{0}', expected '<dataCenterId>/<serverId>'")]
    InvalidNodeId(String),

    #[error("authentication error ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("timed out after {}s waiting for {what}", .waited.as_secs())]
    Timeout { what: String, waited: Duration },

    #[error("request {request} failed: {message}")]
    RequestFailed { request: String, message: String },

    #[error("unsupported action: {0}")]
    Unsupported(String),

    #[error(transparent)]
    FileLoad(#[from] FileLoadError),
}
