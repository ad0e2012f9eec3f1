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

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use ureq;
use ureq::Error;

use crate::common::ProvisionError;

use super::api::{ProfitBricksApi, RequestRef, Tracked};
use super::config::ProfitBricksConfig;
use super::domain::{Collection, CreateFirewallRule, CreateLan, CreateNic, CreateServer, CreateVolume, Payload, ResourceRef};
use super::domain::{DataCenter, FirewallRule, Image, Lan, Location, Nic, RequestStatus, Server, Snapshot, Volume};

// enough to get volumes and NICs (with their properties) inline with servers
const SERVER_DEPTH: u32 = 3;
const LIST_DEPTH: u32 = 1;

pub struct ProfitBricksRestClient {
    agent:          ureq::Agent,
    endpoint:       String,
    auth_header:    String,
}

impl ProfitBricksRestClient {
    pub fn new(config: &ProfitBricksConfig) -> ProfitBricksRestClient {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout)
            .build();

        let credentials = format!("{}:{}", config.username, config.password);
        let auth_header = format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(credentials));

        ProfitBricksRestClient { agent, endpoint: config.endpoint.clone(), auth_header }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent.request(method, &format!("{}{}", self.endpoint, path))
            .set("Authorization", &self.auth_header)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, depth: u32) -> Result<Option<T>, ProvisionError> {
        let resp = self.request("GET", path)
            .query("depth", &depth.to_string())
            .call();

        match resp {
            Ok(response) => Ok(Some(parse_body(path, response)?)),
            Err(Error::Status(404, _)) => Ok(None),
            Err(error) => Err(map_error("GET", path, error)),
        }
    }

    fn list<T: DeserializeOwned>(&self, path: &str, depth: u32) -> Result<Vec<T>, ProvisionError> {
        let collection: Option<Collection<T>> = self.get(path, depth)?;
        Ok(collection.map(|c| c.items).unwrap_or_default())
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<Tracked<T>, ProvisionError> {
        let response = self.request("POST", path)
            .send_json(body)
            .map_err(|error| map_error("POST", path, error))?;

        let request = request_ref_from_response(&response);
        let value = parse_body(path, response)?;
        Ok(Tracked::new(value, request))
    }

    // start/stop/reboot style actions: form-encoded POST with no body
    fn post_action(&self, path: &str) -> Result<Option<RequestRef>, ProvisionError> {
        let response = self.request("POST", path)
            .send_form(&[])
            .map_err(|error| map_error("POST", path, error))?;

        Ok(request_ref_from_response(&response))
    }

    fn delete(&self, path: &str) -> Result<Option<RequestRef>, ProvisionError> {
        match self.request("DELETE", path).call() {
            Ok(response) => Ok(request_ref_from_response(&response)),
            Err(Error::Status(404, _)) => {
                tracing::debug!("DELETE {} found nothing, treating as already deleted", path);
                Ok(None)
            },
            Err(error) => Err(map_error("DELETE", path, error)),
        }
    }
}

fn parse_body<T: DeserializeOwned>(path: &str, response: ureq::Response) -> Result<T, ProvisionError> {
    let resp_string = response.into_string()
        .map_err(|e| ProvisionError::Transport(format!("failed to read response body for {}: {}", path, e)))?;

    serde_json::from_str::<T>(&resp_string)
        .map_err(|e| ProvisionError::Parse(format!("{} for {}: {}", e, path, resp_string)))
}

fn map_error(method: &str, path: &str, error: Error) -> ProvisionError {
    match error {
        Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            match code {
                401 | 403 => ProvisionError::Authentication { status: code, message: body },
                404 => ProvisionError::NotFound(format!("{} {}", method, path)),
                _ => ProvisionError::Api { status: code, message: format!("{} {}: {}", method, path, body) },
            }
        },
        Error::Transport(transport) => {
            ProvisionError::Transport(format!("{} {}: {}", method, path, transport))
        }
    }
}

fn request_ref_from_response(response: &ureq::Response) -> Option<RequestRef> {
    response.header("Location").and_then(request_ref_from_location)
}

/// Pulls the request id out of a status URL like
/// `https://api.profitbricks.com/cloudapi/v4/requests/<id>/status`.
pub fn request_ref_from_location(location: &str) -> Option<RequestRef> {
    let (_, after) = location.split_once("/requests/")?;
    let id = after.split('/').next()?;
    if id.is_empty() {
        return None;
    }
    Some(RequestRef(id.to_string()))
}

impl ProfitBricksApi for ProfitBricksRestClient {
    fn list_data_centers(&self) -> Result<Vec<DataCenter>, ProvisionError> {
        self.list("/datacenters", LIST_DEPTH)
    }

    fn get_data_center(&self, data_center_id: &str) -> Result<Option<DataCenter>, ProvisionError> {
        self.get(&format!("/datacenters/{}", data_center_id), LIST_DEPTH)
    }

    fn list_servers(&self, data_center_id: &str) -> Result<Vec<Server>, ProvisionError> {
        self.list(&format!("/datacenters/{}/servers", data_center_id), SERVER_DEPTH + 1)
    }

    fn get_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<Server>, ProvisionError> {
        self.get(&format!("/datacenters/{}/servers/{}", data_center_id, server_id), SERVER_DEPTH)
    }

    fn create_server(&self, data_center_id: &str, server: &CreateServer) -> Result<Tracked<Server>, ProvisionError> {
        self.post(&format!("/datacenters/{}/servers", data_center_id), &Payload { properties: server })
    }

    fn delete_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.delete(&format!("/datacenters/{}/servers/{}", data_center_id, server_id))
    }

    fn start_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.post_action(&format!("/datacenters/{}/servers/{}/start", data_center_id, server_id))
    }

    fn stop_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.post_action(&format!("/datacenters/{}/servers/{}/stop", data_center_id, server_id))
    }

    fn reboot_server(&self, data_center_id: &str, server_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.post_action(&format!("/datacenters/{}/servers/{}/reboot", data_center_id, server_id))
    }

    fn attach_volume(&self, data_center_id: &str, server_id: &str, volume_id: &str) -> Result<Tracked<Volume>, ProvisionError> {
        self.post(&format!("/datacenters/{}/servers/{}/volumes", data_center_id, server_id),
                  &ResourceRef { id: volume_id.to_string() })
    }

    fn get_volume(&self, data_center_id: &str, volume_id: &str) -> Result<Option<Volume>, ProvisionError> {
        self.get(&format!("/datacenters/{}/volumes/{}", data_center_id, volume_id), LIST_DEPTH)
    }

    fn create_volume(&self, data_center_id: &str, volume: &CreateVolume) -> Result<Tracked<Volume>, ProvisionError> {
        self.post(&format!("/datacenters/{}/volumes", data_center_id), &Payload { properties: volume })
    }

    fn delete_volume(&self, data_center_id: &str, volume_id: &str) -> Result<Option<RequestRef>, ProvisionError> {
        self.delete(&format!("/datacenters/{}/volumes/{}", data_center_id, volume_id))
    }

    fn list_lans(&self, data_center_id: &str) -> Result<Vec<Lan>, ProvisionError> {
        self.list(&format!("/datacenters/{}/lans", data_center_id), LIST_DEPTH)
    }

    fn create_lan(&self, data_center_id: &str, lan: &CreateLan) -> Result<Tracked<Lan>, ProvisionError> {
        self.post(&format!("/datacenters/{}/lans", data_center_id), &Payload { properties: lan })
    }

    fn get_nic(&self, data_center_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>, ProvisionError> {
        self.get(&format!("/datacenters/{}/servers/{}/nics/{}", data_center_id, server_id, nic_id), LIST_DEPTH)
    }

    fn create_nic(&self, data_center_id: &str, server_id: &str, nic: &CreateNic) -> Result<Tracked<Nic>, ProvisionError> {
        self.post(&format!("/datacenters/{}/servers/{}/nics", data_center_id, server_id), &Payload { properties: nic })
    }

    fn create_firewall_rule(&self, data_center_id: &str, server_id: &str, nic_id: &str,
                            rule: &CreateFirewallRule) -> Result<Tracked<FirewallRule>, ProvisionError> {
        self.post(&format!("/datacenters/{}/servers/{}/nics/{}/firewallrules", data_center_id, server_id, nic_id),
                  &Payload { properties: rule })
    }

    fn list_images(&self) -> Result<Vec<Image>, ProvisionError> {
        self.list("/images", LIST_DEPTH)
    }

    fn get_image(&self, image_id: &str) -> Result<Option<Image>, ProvisionError> {
        self.get(&format!("/images/{}", image_id), LIST_DEPTH)
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>, ProvisionError> {
        self.list("/snapshots", LIST_DEPTH)
    }

    fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>, ProvisionError> {
        self.get(&format!("/snapshots/{}", snapshot_id), LIST_DEPTH)
    }

    fn list_locations(&self) -> Result<Vec<Location>, ProvisionError> {
        self.list("/locations", LIST_DEPTH)
    }

    fn get_request_status(&self, request: &RequestRef) -> Result<RequestStatus, ProvisionError> {
        let path = format!("/requests/{}/status", request.0);
        self.get(&path, 0)?
            .ok_or_else(|| ProvisionError::NotFound(format!("request {}", request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockito::{Matcher, Server as MockServer};

    use crate::provision::polling::PollingConfig;
    use crate::provision::providers::provider_profitbricks::domain::{RequestState, VmState};

    fn test_client(server: &MockServer) -> ProfitBricksRestClient {
        let config = ProfitBricksConfig { endpoint: server.url(), username: "ops".to_string(),
                                          password: "pw".to_string(), http_timeout: Duration::from_secs(5),
                                          polling: PollingConfig::default() };
        ProfitBricksRestClient::new(&config)
    }

    #[test]
    fn sends_basic_auth_and_parses_servers() {
        let mut server = MockServer::new();
        let mock = server.mock("GET", "/datacenters/dc-1/servers/srv-1")
            .match_header("authorization", "Basic b3BzOnB3")
            .match_query(Matcher::UrlEncoded("depth".to_string(), "3".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "srv-1", "metadata": {"state": "AVAILABLE"},
                           "properties": {"name": "web-1", "cores": 1, "ram": 1024, "vmState": "SHUTOFF"}}"#)
            .create();

        let client = test_client(&server);
        let found = client.get_server("dc-1", "srv-1").unwrap().unwrap();

        mock.assert();
        assert_eq!(found.properties.name, "web-1");
        assert_eq!(found.properties.vm_state, VmState::Shutoff);
    }

    #[test]
    fn missing_resources_are_none() {
        let mut server = MockServer::new();
        let _mock = server.mock("GET", "/datacenters/dc-1/volumes/nope")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"httpStatus": 404, "messages": [{"message": "Resource does not exist"}]}"#)
            .create();

        let client = test_client(&server);
        assert_eq!(client.get_volume("dc-1", "nope").unwrap(), None);
    }

    #[test]
    fn create_returns_request_from_location_header() {
        let mut server = MockServer::new();
        let mock = server.mock("POST", "/datacenters/dc-1/volumes")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"name": "web-1-disk-1", "size": 40, "type": "HDD", "image": "img-1", "imagePassword": "Secret123"}
            })))
            .with_status(202)
            .with_header("Location", "https://api.profitbricks.com/cloudapi/v4/requests/req-77/status")
            .with_body(r#"{"id": "vol-9", "metadata": {"state": "BUSY"}, "properties": {"name": "web-1-disk-1", "size": 40}}"#)
            .create();

        let client = test_client(&server);
        let create = CreateVolume { name: "web-1-disk-1".to_string(), size: 40, volume_type: "HDD".to_string(),
                                    image: Some("img-1".to_string()), image_password: Some("Secret123".to_string()),
                                    ssh_keys: Vec::new(), licence_type: None };
        let tracked = client.create_volume("dc-1", &create).unwrap();

        mock.assert();
        assert_eq!(tracked.value.id, "vol-9");
        assert_eq!(tracked.request, Some(RequestRef("req-77".to_string())));
    }

    #[test]
    fn status_codes_map_to_errors() {
        let mut server = MockServer::new();
        let _auth = server.mock("GET", "/datacenters")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized")
            .create();
        let _quota = server.mock("POST", "/datacenters/dc-1/lans")
            .with_status(422)
            .with_body(r#"{"messages": [{"message": "quota exceeded"}]}"#)
            .create();

        let client = test_client(&server);
        assert!(matches!(client.list_data_centers(), Err(ProvisionError::Authentication { status: 401, .. })));

        let lan = CreateLan { name: "lan web".to_string(), public: true };
        match client.create_lan("dc-1", &lan) {
            Err(ProvisionError::Api { status, message }) => {
                assert_eq!(status, 422);
                assert!(message.contains("quota exceeded"));
            },
            other => panic!("expected api error, got {:?}", other.map(|t| t.value)),
        }
    }

    #[test]
    fn deleting_missing_resource_succeeds() {
        let mut server = MockServer::new();
        let _mock = server.mock("DELETE", "/datacenters/dc-1/servers/gone")
            .with_status(404)
            .create();

        let client = test_client(&server);
        assert_eq!(client.delete_server("dc-1", "gone").unwrap(), None);
    }

    #[test]
    fn request_status_is_read() {
        let mut server = MockServer::new();
        let _mock = server.mock("GET", "/requests/req-1/status")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": "req-1/status", "metadata": {"status": "DONE", "message": "Request has been successfully executed"}}"#)
            .create();

        let client = test_client(&server);
        let status = client.get_request_status(&RequestRef("req-1".to_string())).unwrap();
        assert_eq!(status.metadata.status, RequestState::Done);
    }

    #[test]
    fn garbage_bodies_are_parse_errors() {
        let mut server = MockServer::new();
        let _mock = server.mock("GET", "/locations")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create();

        let client = test_client(&server);
        assert!(matches!(client.list_locations(), Err(ProvisionError::Parse(msg)) if msg.contains("maintenance")));
    }

    #[test]
    fn request_ids_from_locations() {
        assert_eq!(request_ref_from_location("https://api.profitbricks.com/cloudapi/v4/requests/abc-123/status"),
                   Some(RequestRef("abc-123".to_string())));
        assert_eq!(request_ref_from_location("https://api.profitbricks.com/cloudapi/v4/datacenters/x"), None);
        assert_eq!(request_ref_from_location("/requests//status"), None);
    }
}
