//! Network driver lifecycle operations.
//!
//! Each operation translates its request, hands it to the bridge engine,
//! translates the answer back and logs the outcome exactly once.

use std::fmt::Debug;
use std::sync::Arc;

use crate::endpoint::parse_endpoint_interface;
use crate::engine::BridgeEngine;
use crate::error::{DriverError, Result};
use crate::ipam::parse_ipam_data;
use crate::logging::log_request;
use crate::protocol::*;

/// Network driver backed by a bridge engine.
pub struct Driver {
    engine: Arc<dyn BridgeEngine>,
}

/// Log an operation that returns a value and pass the outcome through.
fn logged<T: Debug>(op: &str, args: Option<&dyn Debug>, res: Result<T>) -> Result<T> {
    match &res {
        Ok(value) => log_request(op, args, Some(value), None),
        Err(e) => log_request(op, args, None, Some(e)),
    }
    res
}

/// Log an operation without a result value.
fn logged_unit(op: &str, args: &dyn Debug, res: Result<()>) -> Result<()> {
    log_request(op, Some(args), None, res.as_ref().err());
    res
}

impl Driver {
    pub fn new(engine: Arc<dyn BridgeEngine>) -> Self {
        Self { engine }
    }

    pub fn get_capabilities(&self) -> Result<CapabilitiesResponse> {
        let res = Ok(CapabilitiesResponse {
            scope: LOCAL_SCOPE.to_string(),
            connectivity_scope: LOCAL_SCOPE.to_string(),
        });
        logged("GetCapabilities", None, res)
    }

    pub async fn create_network(&self, req: &CreateNetworkRequest) -> Result<()> {
        let res = async {
            let ipv4 = parse_ipam_data(&req.ipv4_data).map_err(|e| {
                DriverError::bad_request(format!("invalid IPv4 information: {}", e))
            })?;
            let ipv6 = parse_ipam_data(&req.ipv6_data).map_err(|e| {
                DriverError::bad_request(format!("invalid IPv6 information: {}", e))
            })?;

            self.engine
                .create_network(&req.network_id, &req.options, ipv4, ipv6)
                .await
        }
        .await;
        logged_unit("CreateNetwork", req, res)
    }

    /// Cluster-wide allocation is not supported.
    pub fn allocate_network(
        &self,
        req: &AllocateNetworkRequest,
    ) -> Result<AllocateNetworkResponse> {
        let res = Err(DriverError::not_implemented("not implemented"));
        logged("AllocateNetwork", Some(req), res)
    }

    pub async fn delete_network(&self, req: &DeleteNetworkRequest) -> Result<()> {
        let res = self.engine.delete_network(&req.network_id).await;
        logged_unit("DeleteNetwork", req, res)
    }

    /// Cluster-wide allocation is not supported.
    pub fn free_network(&self, req: &FreeNetworkRequest) -> Result<()> {
        let res = Err(DriverError::not_implemented("not implemented"));
        logged_unit("FreeNetwork", req, res)
    }

    pub async fn create_endpoint(
        &self,
        req: &CreateEndpointRequest,
    ) -> Result<CreateEndpointResponse> {
        let res = async {
            let iface = parse_endpoint_interface(req.interface.as_ref()).map_err(|e| {
                DriverError::bad_request(format!("invalid endpoint info: {}", e))
            })?;
            let iface = self
                .engine
                .create_endpoint(&req.network_id, &req.endpoint_id, iface, &req.options)
                .await?;
            Ok::<_, DriverError>(CreateEndpointResponse {
                interface: Some(iface.marshal()),
            })
        }
        .await;
        logged("CreateEndpoint", Some(req), res)
    }

    pub async fn delete_endpoint(&self, req: &DeleteEndpointRequest) -> Result<()> {
        let res = self
            .engine
            .delete_endpoint(&req.network_id, &req.endpoint_id)
            .await;
        logged_unit("DeleteEndpoint", req, res)
    }

    pub async fn endpoint_info(&self, req: &InfoRequest) -> Result<InfoResponse> {
        let res = self
            .engine
            .endpoint_info(&req.network_id, &req.endpoint_id)
            .await
            .map(|value| InfoResponse { value });
        logged("EndpointInfo", Some(req), res)
    }

    pub async fn join(&self, req: &JoinRequest) -> Result<JoinResponse> {
        let res = self
            .engine
            .join(
                &req.network_id,
                &req.endpoint_id,
                &req.sandbox_key,
                &req.options,
            )
            .await
            .map(|info| info.marshal());
        logged("Join", Some(req), res)
    }

    pub async fn leave(&self, req: &LeaveRequest) -> Result<()> {
        let res = self.engine.leave(&req.network_id, &req.endpoint_id).await;
        logged_unit("Leave", req, res)
    }

    /// Multi-host discovery is not used by this driver.
    pub fn discover_new(&self, notif: &DiscoveryNotification) -> Result<()> {
        logged_unit("DiscoverNew", notif, Ok(()))
    }

    pub fn discover_delete(&self, notif: &DiscoveryNotification) -> Result<()> {
        logged_unit("DiscoverDelete", notif, Ok(()))
    }

    /// Called after Join on non-internal networks. The driver provides no
    /// external connectivity, but an error here would fail the endpoint setup.
    pub fn program_external_connectivity(
        &self,
        req: &ProgramExternalConnectivityRequest,
    ) -> Result<()> {
        logged_unit("ProgramExternalConnectivity", req, Ok(()))
    }

    /// Called before Leave. Same contract as `program_external_connectivity`.
    pub fn revoke_external_connectivity(
        &self,
        req: &RevokeExternalConnectivityRequest,
    ) -> Result<()> {
        logged_unit("RevokeExternalConnectivity", req, Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::error::ErrorKind;

    fn driver() -> Driver {
        Driver::new(Arc::new(MemoryEngine::new()))
    }

    #[test]
    fn test_capabilities_are_local() {
        let caps = driver().get_capabilities().unwrap();
        assert_eq!(caps.scope, "local");
        assert_eq!(caps.connectivity_scope, "local");
    }

    #[tokio::test]
    async fn test_endpoint_lifecycle_against_memory_engine() {
        let driver = driver();
        let req: CreateNetworkRequest = serde_json::from_value(serde_json::json!({
            "NetworkID": "n1",
            "IPv4Data": [{
                "AddressSpace": "LocalDefault",
                "Pool": "10.5.0.0/24",
                "Gateway": "10.5.0.1/24"
            }]
        }))
        .unwrap();
        driver.create_network(&req).await.unwrap();

        let created = driver
            .create_endpoint(&CreateEndpointRequest {
                network_id: "n1".to_string(),
                endpoint_id: "e1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let iface = created.interface.unwrap();
        assert_eq!(iface.address, "10.5.0.2/24");
        assert!(iface.address_ipv6.is_empty());
        assert!(!iface.mac_address.is_empty());

        let joined = driver
            .join(&JoinRequest {
                network_id: "n1".to_string(),
                endpoint_id: "e1".to_string(),
                sandbox_key: "/var/run/docker/netns/1".to_string(),
                options: Options::new(),
            })
            .await
            .unwrap();
        assert_eq!(joined.gateway, "10.5.0.1");

        let err = driver
            .delete_network(&DeleteNetworkRequest {
                network_id: "n1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Forbidden));
    }
}
