//! Bridge engine abstraction.
//!
//! The driver only translates requests; the engine owns the networks and
//! endpoints and does the actual plumbing.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::endpoint::{InterfaceInfo, JoinInfo};
use crate::error::Result;
use crate::ipam::IpamPool;
use crate::protocol::Options;

pub use memory::MemoryEngine;

/// Operations a bridge engine must provide.
///
/// Implementations are expected to serialize or reject out-of-order calls for
/// the same network or endpoint identifier.
#[async_trait]
pub trait BridgeEngine: Send + Sync {
    async fn create_network(
        &self,
        network_id: &str,
        options: &Options,
        ipv4: Vec<IpamPool>,
        ipv6: Vec<IpamPool>,
    ) -> Result<()>;

    async fn delete_network(&self, network_id: &str) -> Result<()>;

    /// Create an endpoint. Unset fields of `iface` are assigned by the engine
    /// and the completed interface is returned.
    async fn create_endpoint(
        &self,
        network_id: &str,
        endpoint_id: &str,
        iface: InterfaceInfo,
        options: &Options,
    ) -> Result<InterfaceInfo>;

    async fn delete_endpoint(&self, network_id: &str, endpoint_id: &str) -> Result<()>;

    async fn endpoint_info(
        &self,
        network_id: &str,
        endpoint_id: &str,
    ) -> Result<BTreeMap<String, String>>;

    async fn join(
        &self,
        network_id: &str,
        endpoint_id: &str,
        sandbox_key: &str,
        options: &Options,
    ) -> Result<JoinInfo>;

    async fn leave(&self, network_id: &str, endpoint_id: &str) -> Result<()>;
}
