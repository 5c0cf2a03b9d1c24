//! Address pool parsing for network creation.
//!
//! The orchestrator hands pools over as strings. They are parsed here into
//! [`IpamPool`] values before anything reaches the bridge engine.

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::null_as_default;

/// Address pool parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpamError {
    #[error("entry {index}: invalid pool {value:?}")]
    InvalidPool { index: usize, value: String },

    #[error("entry {index}: invalid gateway {value:?}")]
    InvalidGateway { index: usize, value: String },

    #[error("entry {index}: invalid auxiliary address {name}={value:?}")]
    InvalidAuxAddress {
        index: usize,
        name: String,
        value: String,
    },
}

/// Address pool entry as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpamData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address_space: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pool: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub gateway: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub aux_addresses: BTreeMap<String, String>,
}

/// A parsed address pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpamPool {
    pub address_space: String,
    /// Pool prefix.
    pub pool: IpNet,
    /// Gateway with its prefix length, keeps host bits.
    pub gateway: Option<IpNet>,
    /// Reserved addresses keyed by name.
    pub aux_addresses: BTreeMap<String, IpAddr>,
}

impl IpamData {
    /// Parse a single entry. `index` is only used in error messages.
    pub fn parse(&self, index: usize) -> Result<IpamPool, IpamError> {
        let pool: IpNet = self.pool.parse().map_err(|_| IpamError::InvalidPool {
            index,
            value: self.pool.clone(),
        })?;

        let gateway = if self.gateway.is_empty() {
            None
        } else {
            let gw: IpNet = self
                .gateway
                .parse()
                .map_err(|_| IpamError::InvalidGateway {
                    index,
                    value: self.gateway.clone(),
                })?;
            Some(gw)
        };

        let aux_addresses = self
            .aux_addresses
            .iter()
            .map(|(name, value)| {
                value
                    .parse::<IpAddr>()
                    .map(|addr| (name.clone(), addr))
                    .map_err(|_| IpamError::InvalidAuxAddress {
                        index,
                        name: name.clone(),
                        value: value.clone(),
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(IpamPool {
            address_space: self.address_space.clone(),
            pool,
            gateway,
            aux_addresses,
        })
    }
}

/// Parse a list of pool entries, preserving order.
///
/// The first malformed entry fails the whole list.
pub fn parse_ipam_data(entries: &[IpamData]) -> Result<Vec<IpamPool>, IpamError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| entry.parse(index))
        .collect()
}
