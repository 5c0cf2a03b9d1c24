//! In-process bridge engine.
//!
//! Tracks networks and endpoints and assigns MAC and IP addresses, without
//! creating any devices on the host.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::BridgeEngine;
use crate::endpoint::{InterfaceInfo, InterfaceName, JoinInfo, MacAddress};
use crate::error::{DriverError, Result};
use crate::ipam::IpamPool;
use crate::protocol::Options;

/// Prefix of the host-side interface name.
const VETH_PREFIX: &str = "veth";

/// Name prefix of the interface inside the sandbox.
const CONTAINER_IFACE_PREFIX: &str = "eth";

/// Upper bound on addresses probed per allocation.
const MAX_PROBE: usize = 65536;

#[derive(Debug)]
struct NetworkState {
    ipv4: Vec<IpamPool>,
    ipv6: Vec<IpamPool>,
    endpoints: BTreeMap<String, EndpointState>,
}

#[derive(Debug)]
struct EndpointState {
    iface: InterfaceInfo,
    sandbox_key: Option<String>,
}

impl NetworkState {
    fn v4_pools(&self) -> impl Iterator<Item = Ipv4Net> {
        self.ipv4.iter().filter_map(|p| match p.pool {
            IpNet::V4(net) => Some(net),
            IpNet::V6(_) => None,
        })
    }

    fn v6_pools(&self) -> impl Iterator<Item = Ipv6Net> {
        self.ipv6.iter().filter_map(|p| match p.pool {
            IpNet::V6(net) => Some(net),
            IpNet::V4(_) => None,
        })
    }

    /// Addresses held by endpoints, gateways and auxiliary reservations.
    fn reserved(&self) -> HashSet<IpAddr> {
        let mut used = HashSet::new();
        for pool in self.ipv4.iter().chain(self.ipv6.iter()) {
            if let Some(gw) = pool.gateway {
                used.insert(gw.addr());
            }
            used.extend(pool.aux_addresses.values().copied());
        }
        for ep in self.endpoints.values() {
            if let Some(a) = ep.iface.address {
                used.insert(IpAddr::V4(a.addr()));
            }
            if let Some(a) = ep.iface.address_ipv6 {
                used.insert(IpAddr::V6(a.addr()));
            }
        }
        used
    }

    fn endpoint(&self, network_id: &str, endpoint_id: &str) -> Result<&EndpointState> {
        self.endpoints.get(endpoint_id).ok_or_else(|| {
            DriverError::not_found(format!(
                "endpoint {} not found in network {}",
                endpoint_id, network_id
            ))
        })
    }

    fn endpoint_mut(
        &mut self,
        network_id: &str,
        endpoint_id: &str,
    ) -> Result<&mut EndpointState> {
        self.endpoints.get_mut(endpoint_id).ok_or_else(|| {
            DriverError::not_found(format!(
                "endpoint {} not found in network {}",
                endpoint_id, network_id
            ))
        })
    }

    /// Check a requested IPv4 address or pick the next free one.
    fn assign_ipv4(
        &self,
        requested: Option<Ipv4Net>,
        used: &HashSet<IpAddr>,
    ) -> Result<Option<Ipv4Net>> {
        if let Some(addr) = requested {
            let Some(net) = self.v4_pools().find(|net| net.contains(&addr.addr())) else {
                return Err(DriverError::bad_request(format!(
                    "IPv4 address {} is not within any pool of the network",
                    addr
                )));
            };
            if net.prefix_len() < 31
                && (addr.addr() == net.network() || addr.addr() == net.broadcast())
            {
                return Err(DriverError::bad_request(format!(
                    "IPv4 address {} is not a host address of {}",
                    addr.addr(),
                    net
                )));
            }
            if used.contains(&IpAddr::V4(addr.addr())) {
                return Err(DriverError::bad_request(format!(
                    "IPv4 address {} is already in use",
                    addr.addr()
                )));
            }
            return Ok(Some(addr));
        }

        let Some(net) = self.v4_pools().next() else {
            return Ok(None);
        };
        let free = net
            .hosts()
            .filter(|a| *a != net.network())
            .take(MAX_PROBE)
            .find(|a| !used.contains(&IpAddr::V4(*a)));
        match free {
            Some(a) => Ok(Some(to_ipv4_net(a, net.prefix_len())?)),
            None => Err(DriverError::no_service(format!(
                "no IPv4 addresses available in {}",
                net
            ))),
        }
    }

    /// Check a requested IPv6 address or pick the next free one.
    fn assign_ipv6(
        &self,
        requested: Option<Ipv6Net>,
        used: &HashSet<IpAddr>,
    ) -> Result<Option<Ipv6Net>> {
        if let Some(addr) = requested {
            let Some(net) = self.v6_pools().find(|net| net.contains(&addr.addr())) else {
                return Err(DriverError::bad_request(format!(
                    "IPv6 address {} is not within any pool of the network",
                    addr
                )));
            };
            // Subnet-router anycast
            if net.prefix_len() < 127 && addr.addr() == net.network() {
                return Err(DriverError::bad_request(format!(
                    "IPv6 address {} is not a host address of {}",
                    addr.addr(),
                    net
                )));
            }
            if used.contains(&IpAddr::V6(addr.addr())) {
                return Err(DriverError::bad_request(format!(
                    "IPv6 address {} is already in use",
                    addr.addr()
                )));
            }
            return Ok(Some(addr));
        }

        let Some(net) = self.v6_pools().next() else {
            return Ok(None);
        };
        let free = net
            .hosts()
            .filter(|a| *a != net.network())
            .take(MAX_PROBE)
            .find(|a| !used.contains(&IpAddr::V6(*a)));
        match free {
            Some(a) => Ok(Some(to_ipv6_net(a, net.prefix_len())?)),
            None => Err(DriverError::no_service(format!(
                "no IPv6 addresses available in {}",
                net
            ))),
        }
    }

    fn gateway_v4(&self) -> Option<Ipv4Addr> {
        self.ipv4.iter().find_map(|p| match p.gateway {
            Some(IpNet::V4(gw)) => Some(gw.addr()),
            _ => None,
        })
    }

    fn gateway_v6(&self) -> Option<Ipv6Addr> {
        self.ipv6.iter().find_map(|p| match p.gateway {
            Some(IpNet::V6(gw)) => Some(gw.addr()),
            _ => None,
        })
    }
}

fn to_ipv4_net(addr: Ipv4Addr, prefix_len: u8) -> Result<Ipv4Net> {
    Ipv4Net::new(addr, prefix_len).map_err(|e| DriverError::internal(e.to_string()))
}

fn to_ipv6_net(addr: Ipv6Addr, prefix_len: u8) -> Result<Ipv6Net> {
    Ipv6Net::new(addr, prefix_len).map_err(|e| DriverError::internal(e.to_string()))
}

fn network_not_found(network_id: &str) -> DriverError {
    DriverError::not_found(format!("network {} not found", network_id))
}

/// Host-side device name for an endpoint.
fn veth_name(endpoint_id: &str) -> String {
    let suffix: String = endpoint_id.chars().take(7).collect();
    format!("{}{}", VETH_PREFIX, suffix)
}

/// Bridge engine that keeps all state in memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    networks: RwLock<HashMap<String, NetworkState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of all known networks, sorted.
    pub async fn network_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.networks.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl BridgeEngine for MemoryEngine {
    async fn create_network(
        &self,
        network_id: &str,
        options: &Options,
        ipv4: Vec<IpamPool>,
        ipv6: Vec<IpamPool>,
    ) -> Result<()> {
        let mut networks = self.networks.write().await;
        if networks.contains_key(network_id) {
            return Err(DriverError::forbidden(format!(
                "network {} already exists",
                network_id
            )));
        }

        debug!(
            network_id = %network_id,
            options = ?options.keys().collect::<Vec<_>>(),
            "Network options"
        );
        info!(
            network_id = %network_id,
            ipv4_pools = ipv4.len(),
            ipv6_pools = ipv6.len(),
            "Network created"
        );

        networks.insert(
            network_id.to_string(),
            NetworkState {
                ipv4,
                ipv6,
                endpoints: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        let mut networks = self.networks.write().await;
        let network = networks
            .get(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        if !network.endpoints.is_empty() {
            return Err(DriverError::forbidden(format!(
                "network {} has {} endpoints",
                network_id,
                network.endpoints.len()
            )));
        }
        networks.remove(network_id);
        info!(network_id = %network_id, "Network deleted");
        Ok(())
    }

    async fn create_endpoint(
        &self,
        network_id: &str,
        endpoint_id: &str,
        iface: InterfaceInfo,
        options: &Options,
    ) -> Result<InterfaceInfo> {
        let mut networks = self.networks.write().await;
        let network = networks
            .get_mut(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        if network.endpoints.contains_key(endpoint_id) {
            return Err(DriverError::forbidden(format!(
                "endpoint {} already exists in network {}",
                endpoint_id, network_id
            )));
        }

        let used = network.reserved();
        let address = network.assign_ipv4(iface.address, &used)?;
        let address_ipv6 = network.assign_ipv6(iface.address_ipv6, &used)?;
        let stored = InterfaceInfo {
            mac_address: Some(iface.mac_address.unwrap_or_else(MacAddress::generate)),
            address,
            address_ipv6,
        };
        // The caller must not get back fields it supplied itself.
        let assigned = InterfaceInfo {
            mac_address: stored.mac_address.filter(|_| iface.mac_address.is_none()),
            address: stored.address.filter(|_| iface.address.is_none()),
            address_ipv6: stored.address_ipv6.filter(|_| iface.address_ipv6.is_none()),
        };

        debug!(
            endpoint_id = %endpoint_id,
            options = ?options.keys().collect::<Vec<_>>(),
            "Endpoint options"
        );
        info!(
            network_id = %network_id,
            endpoint_id = %endpoint_id,
            mac = ?stored.mac_address.map(|m| m.to_string()),
            ipv4 = ?stored.address.map(|a| a.to_string()),
            ipv6 = ?stored.address_ipv6.map(|a| a.to_string()),
            "Endpoint created"
        );

        network.endpoints.insert(
            endpoint_id.to_string(),
            EndpointState {
                iface: stored,
                sandbox_key: None,
            },
        );
        Ok(assigned)
    }

    async fn delete_endpoint(&self, network_id: &str, endpoint_id: &str) -> Result<()> {
        let mut networks = self.networks.write().await;
        let network = networks
            .get_mut(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        if let Some(key) = &network.endpoint(network_id, endpoint_id)?.sandbox_key {
            return Err(DriverError::forbidden(format!(
                "endpoint {} is still joined to sandbox {}",
                endpoint_id, key
            )));
        }
        network.endpoints.remove(endpoint_id);
        info!(network_id = %network_id, endpoint_id = %endpoint_id, "Endpoint deleted");
        Ok(())
    }

    async fn endpoint_info(
        &self,
        network_id: &str,
        endpoint_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        let networks = self.networks.read().await;
        let network = networks
            .get(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        let ep = network.endpoint(network_id, endpoint_id)?;

        let mut info = BTreeMap::new();
        info.insert("id".to_string(), endpoint_id.to_string());
        info.insert("network_id".to_string(), network_id.to_string());
        if let Some(mac) = ep.iface.mac_address {
            info.insert("mac_address".to_string(), mac.to_string());
        }
        if let Some(addr) = ep.iface.address {
            info.insert("address".to_string(), addr.to_string());
        }
        if let Some(addr) = ep.iface.address_ipv6 {
            info.insert("address_ipv6".to_string(), addr.to_string());
        }
        if let Some(key) = &ep.sandbox_key {
            info.insert("sandbox_key".to_string(), key.clone());
        }
        Ok(info)
    }

    async fn join(
        &self,
        network_id: &str,
        endpoint_id: &str,
        sandbox_key: &str,
        _options: &Options,
    ) -> Result<JoinInfo> {
        let mut networks = self.networks.write().await;
        let network = networks
            .get_mut(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        let gateway = network.gateway_v4();
        let gateway_ipv6 = network.gateway_v6();

        let ep = network.endpoint_mut(network_id, endpoint_id)?;
        if let Some(key) = &ep.sandbox_key {
            return Err(DriverError::forbidden(format!(
                "endpoint {} is already joined to sandbox {}",
                endpoint_id, key
            )));
        }
        ep.sandbox_key = Some(sandbox_key.to_string());

        info!(
            network_id = %network_id,
            endpoint_id = %endpoint_id,
            sandbox_key = %sandbox_key,
            "Endpoint joined"
        );

        Ok(JoinInfo {
            interface_name: InterfaceName {
                src_name: veth_name(endpoint_id),
                dst_prefix: CONTAINER_IFACE_PREFIX.to_string(),
            },
            gateway,
            gateway_ipv6,
            static_routes: Vec::new(),
            disable_gateway_service: false,
        })
    }

    async fn leave(&self, network_id: &str, endpoint_id: &str) -> Result<()> {
        let mut networks = self.networks.write().await;
        let network = networks
            .get_mut(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        let ep = network.endpoint_mut(network_id, endpoint_id)?;
        if ep.sandbox_key.take().is_none() {
            return Err(DriverError::forbidden(format!(
                "endpoint {} is not joined",
                endpoint_id
            )));
        }
        info!(network_id = %network_id, endpoint_id = %endpoint_id, "Endpoint left");
        Ok(())
    }
}
