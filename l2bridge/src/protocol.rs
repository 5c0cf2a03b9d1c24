//! Wire types of the network driver plugin protocol.
//!
//! Field names follow the orchestrator's PascalCase JSON. Missing fields and
//! explicit `null`s decode to defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::endpoint::EndpointInterface;
use crate::ipam::IpamData;

/// Driver-specific options, forwarded untouched.
pub type Options = BTreeMap<String, serde_json::Value>;

/// Scope value for networks visible on this host only.
pub const LOCAL_SCOPE: &str = "local";

/// Media type of every plugin response.
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

/// Decode `null` as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response body of operations without a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    #[serde(rename = "Scope")]
    pub scope: String,
    #[serde(rename = "ConnectivityScope")]
    pub connectivity_scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateNetworkRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "Options", default, deserialize_with = "null_as_default")]
    pub options: Options,
    #[serde(rename = "IPv4Data", default, deserialize_with = "null_as_default")]
    pub ipv4_data: Vec<IpamData>,
    #[serde(rename = "IPv6Data", default, deserialize_with = "null_as_default")]
    pub ipv6_data: Vec<IpamData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocateNetworkRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "Options", default, deserialize_with = "null_as_default")]
    pub options: BTreeMap<String, String>,
    #[serde(rename = "IPv4Data", default, deserialize_with = "null_as_default")]
    pub ipv4_data: Vec<IpamData>,
    #[serde(rename = "IPv6Data", default, deserialize_with = "null_as_default")]
    pub ipv6_data: Vec<IpamData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateNetworkResponse {
    #[serde(rename = "Options")]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteNetworkRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeNetworkRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEndpointRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
    #[serde(rename = "Interface", default)]
    pub interface: Option<EndpointInterface>,
    #[serde(rename = "Options", default, deserialize_with = "null_as_default")]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEndpointResponse {
    #[serde(rename = "Interface", skip_serializing_if = "Option::is_none")]
    pub interface: Option<EndpointInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEndpointRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    #[serde(rename = "Value")]
    pub value: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
    #[serde(rename = "SandboxKey", default, deserialize_with = "null_as_default")]
    pub sandbox_key: String,
    #[serde(rename = "Options", default, deserialize_with = "null_as_default")]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterfaceName {
    pub src_name: String,
    pub dst_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StaticRoute {
    pub destination: String,
    pub route_type: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_hop: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(rename = "InterfaceName")]
    pub interface_name: InterfaceName,
    #[serde(rename = "Gateway", default, skip_serializing_if = "String::is_empty")]
    pub gateway: String,
    #[serde(rename = "GatewayIPv6", default, skip_serializing_if = "String::is_empty")]
    pub gateway_ipv6: String,
    #[serde(rename = "StaticRoutes", default, skip_serializing_if = "Vec::is_empty")]
    pub static_routes: Vec<StaticRoute>,
    #[serde(rename = "DisableGatewayService", default)]
    pub disable_gateway_service: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryNotification {
    #[serde(rename = "DiscoveryType", default, deserialize_with = "null_as_default")]
    pub discovery_type: i32,
    #[serde(rename = "DiscoveryData", default)]
    pub discovery_data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramExternalConnectivityRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
    #[serde(rename = "Options", default, deserialize_with = "null_as_default")]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeExternalConnectivityRequest {
    #[serde(rename = "NetworkID", default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(rename = "EndpointID", default, deserialize_with = "null_as_default")]
    pub endpoint_id: String,
}

/// Body of a failed plugin call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_network_request_decodes_orchestrator_payload() {
        let body = json!({
            "NetworkID": "n1",
            "Options": {
                "com.docker.network.enable_ipv6": false,
                "com.docker.network.generic": { "mtu": "1450" }
            },
            "IPv4Data": [{
                "AddressSpace": "LocalDefault",
                "Pool": "172.18.0.0/16",
                "Gateway": "172.18.0.1/16",
                "AuxAddresses": null
            }],
            "IPv6Data": null
        });
        let req: CreateNetworkRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.network_id, "n1");
        assert_eq!(req.ipv4_data.len(), 1);
        assert!(req.ipv6_data.is_empty());
        assert_eq!(req.options["com.docker.network.generic"]["mtu"], "1450");
    }

    #[test]
    fn test_create_endpoint_request_without_interface() {
        let req: CreateEndpointRequest =
            serde_json::from_value(json!({ "NetworkID": "n1", "EndpointID": "e1", "Interface": null }))
                .unwrap();
        assert!(req.interface.is_none());
        assert!(req.options.is_empty());
    }

    #[test]
    fn test_capabilities_wire_shape() {
        let caps = CapabilitiesResponse {
            scope: LOCAL_SCOPE.to_string(),
            connectivity_scope: LOCAL_SCOPE.to_string(),
        };
        assert_eq!(
            serde_json::to_value(caps).unwrap(),
            json!({ "Scope": "local", "ConnectivityScope": "local" })
        );
    }
}
