//! Endpoint interface and join result codecs.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{self, null_as_default};

/// Endpoint interface parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("invalid MAC address: {0:?}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 address: {0:?}")]
    InvalidIpv4Address(String),

    #[error("invalid IPv6 address: {0:?}")]
    InvalidIpv6Address(String),
}

/// An Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Random locally administered unicast address.
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut mac = [0u8; 6];
        rng.fill(&mut mac);
        // Set locally administered and unicast bits
        mac[0] = (mac[0] & 0xfe) | 0x02;
        MacAddress(mac)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = InterfaceError;

    /// Accepts `02:42:ac:11:00:02` and `02-42-ac-11-00-02`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InterfaceError::InvalidMacAddress(s.to_string());

        let sep = if s.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = s.split(sep).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut mac = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            mac[i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(mac))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Endpoint interface as sent on the wire. Empty strings mean unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInterface {
    #[serde(
        rename = "Address",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub address: String,
    #[serde(
        rename = "AddressIPv6",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub address_ipv6: String,
    #[serde(
        rename = "MacAddress",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub mac_address: String,
}

/// Parsed endpoint interface. `None` fields are left to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub mac_address: Option<MacAddress>,
    pub address: Option<Ipv4Net>,
    pub address_ipv6: Option<Ipv6Net>,
}

impl InterfaceInfo {
    /// Convert back to the wire shape, populating only the set fields.
    pub fn marshal(&self) -> EndpointInterface {
        EndpointInterface {
            address: self.address.map(|a| a.to_string()).unwrap_or_default(),
            address_ipv6: self.address_ipv6.map(|a| a.to_string()).unwrap_or_default(),
            mac_address: self
                .mac_address
                .map(|m| m.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Parse a wire interface. A missing interface parses to an empty one.
pub fn parse_endpoint_interface(
    iface: Option<&EndpointInterface>,
) -> Result<InterfaceInfo, InterfaceError> {
    let Some(iface) = iface else {
        return Ok(InterfaceInfo::default());
    };

    let mac_address = if iface.mac_address.is_empty() {
        None
    } else {
        Some(iface.mac_address.parse::<MacAddress>()?)
    };

    let address = if iface.address.is_empty() {
        None
    } else {
        let addr: Ipv4Net = iface
            .address
            .parse()
            .map_err(|_| InterfaceError::InvalidIpv4Address(iface.address.clone()))?;
        Some(addr)
    };

    let address_ipv6 = if iface.address_ipv6.is_empty() {
        None
    } else {
        let addr: Ipv6Net = iface
            .address_ipv6
            .parse()
            .map_err(|_| InterfaceError::InvalidIpv6Address(iface.address_ipv6.clone()))?;
        Some(addr)
    };

    Ok(InterfaceInfo {
        mac_address,
        address,
        address_ipv6,
    })
}

/// Names the host-side device and the name prefix used inside the sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceName {
    pub src_name: String,
    pub dst_prefix: String,
}

/// How a static route reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteType {
    NextHop,
    Connected,
}

impl RouteType {
    fn wire_value(self) -> i32 {
        match self {
            RouteType::NextHop => 0,
            RouteType::Connected => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    pub destination: IpNet,
    pub route_type: RouteType,
    pub next_hop: Option<IpAddr>,
}

/// Result of joining an endpoint to a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinInfo {
    pub interface_name: InterfaceName,
    pub gateway: Option<Ipv4Addr>,
    pub gateway_ipv6: Option<Ipv6Addr>,
    pub static_routes: Vec<StaticRoute>,
    pub disable_gateway_service: bool,
}

impl JoinInfo {
    pub fn marshal(&self) -> protocol::JoinResponse {
        protocol::JoinResponse {
            interface_name: protocol::InterfaceName {
                src_name: self.interface_name.src_name.clone(),
                dst_prefix: self.interface_name.dst_prefix.clone(),
            },
            gateway: self.gateway.map(|g| g.to_string()).unwrap_or_default(),
            gateway_ipv6: self.gateway_ipv6.map(|g| g.to_string()).unwrap_or_default(),
            static_routes: self
                .static_routes
                .iter()
                .map(|r| protocol::StaticRoute {
                    destination: r.destination.to_string(),
                    route_type: r.route_type.wire_value(),
                    next_hop: r.next_hop.map(|h| h.to_string()).unwrap_or_default(),
                })
                .collect(),
            disable_gateway_service: self.disable_gateway_service,
        }
    }
}
