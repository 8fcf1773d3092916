//! IPv4 address block (CIDR) utilities.
//!
//! Provides the [`Ipv4`] block type used for the VPC and every subnet, along
//! with the mask arithmetic the topology synthesizer relies on.

use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::net::Ipv4Addr;

/// Maximum length for an IPv4 subnet mask (32 bits).
pub const MAX_LENGTH: u8 = 32;

/// Smallest subnet AWS accepts is a /28.
pub const MIN_SUBNET_LENGTH: u8 = 28;

/// Addresses AWS reserves in every subnet (network, router, DNS, future, broadcast).
pub const RESERVED_ADDRESSES: u64 = 5;

/// Convert a CIDR prefix length to a subnet mask as u32.
///
/// # Examples
/// ```
/// use vpc_topology::models::get_cidr_mask;
/// assert_eq!(get_cidr_mask(24).unwrap(), 0xFFFFFF00);
/// ```
pub fn get_cidr_mask(len: u8) -> Result<u32, Box<dyn Error>> {
    if len > MAX_LENGTH {
        Err("Network length is too long".into())
    } else {
        let right_len = MAX_LENGTH - len;
        let all_bits = u32::MAX as u64;

        let mask = (all_bits >> right_len) << right_len;

        Ok(mask as u32)
    }
}

/// Get the network address for a given IP and prefix length.
pub fn cut_addr(addr: Ipv4Addr, len: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    if len > MAX_LENGTH {
        Err("Network length is too long".into())
    } else {
        let right_len = MAX_LENGTH - len;
        let bits = u32::from(addr) as u64;
        let new_bits = (bits >> right_len) << right_len;

        Ok(Ipv4Addr::from(new_bits as u32))
    }
}

/// Returns the IP address following the given subnet.
pub fn ip_after_subnet(addr: Ipv4Addr, cidr: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    if cidr > MAX_LENGTH {
        Err("Network length is too long".into())
    } else {
        let subnet_size = 1u64 << (MAX_LENGTH - cidr);
        let network_bits = (u32::from(addr) & get_cidr_mask(cidr)?) as u64;
        let next_subnet_bits = network_bits + subnet_size;
        let next_subnet_bits =
            u32::try_from(next_subnet_bits).map_err(|_| "Next subnet calculation overflowed")?;
        Ok(Ipv4Addr::from(next_subnet_bits))
    }
}

/// Calculate the broadcast address for a given IP and prefix length.
pub fn broadcast_addr(addr: Ipv4Addr, len: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    if len > MAX_LENGTH {
        Err("Network length is too long".into())
    } else {
        let mask = get_cidr_mask(len)?;
        let network_bits = u32::from(addr) & mask;
        let broadcast_bits = network_bits | (!mask);
        Ok(Ipv4Addr::from(broadcast_bits))
    }
}

/// Calculate the number of usable host addresses in an AWS subnet.
///
/// AWS reserves 5 addresses per subnet and refuses subnets smaller than /28.
pub fn usable_hosts(len: u8) -> Result<u64, Box<dyn Error>> {
    if len > MIN_SUBNET_LENGTH {
        Err("Network length is too long or invalid".into())
    } else {
        Ok((1u64 << (MAX_LENGTH - len)) - RESERVED_ADDRESSES)
    }
}

/// IPv4 address block in CIDR notation.
///
/// Constructed through [`Ipv4::new`], the address is always the network
/// address for the mask (no host bits set).
#[derive(Eq, Ord, Debug, Copy, Clone, Hash)]
pub struct Ipv4 {
    /// The network address.
    pub addr: Ipv4Addr,
    /// The prefix length (0-32).
    pub mask: u8,
}

impl Serialize for Ipv4 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4 {
    fn deserialize<D>(deserializer: D) -> Result<Ipv4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4::new(&s).map_err(|e| de::Error::custom(format!("invalid CIDR {s}: {e}")))
    }
}

impl Ipv4 {
    /// Create a new [`Ipv4`] block from a CIDR string (e.g., "10.0.0.0/24").
    ///
    /// Rejects strings with host bits set, such as "10.0.0.1/24", and any
    /// prefix that is not plain ASCII digits ("+16", " 16").
    pub fn new(addr_cidr: &str) -> Result<Ipv4, Box<dyn Error>> {
        let (addr, mask) = addr_cidr
            .split_once('/')
            .ok_or_else(|| format!("Invalid address/mask {addr_cidr}"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| format!("Invalid address {addr}"))?;
        if mask.is_empty() || !mask.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("Invalid subnet mask {mask:?}").into());
        }
        let mask: u8 = mask
            .parse()
            .map_err(|_| format!("Invalid subnet mask {mask}"))?;
        if mask > MAX_LENGTH {
            return Err("Network length is too long".into());
        }
        if cut_addr(addr, mask)? != addr {
            return Err(format!("{addr_cidr} has host bits set").into());
        }
        Ok(Ipv4 { addr, mask })
    }

    /// Get the highest (broadcast) address in the block.
    pub fn hi(&self) -> Ipv4Addr {
        let mask = get_cidr_mask(self.mask).unwrap_or(u32::MAX);
        Ipv4Addr::from(u32::from(self.addr) | !mask)
    }

    /// Get the lowest (network) address in the block.
    pub fn lo(&self) -> Ipv4Addr {
        self.addr
    }

    /// Number of addresses covered by the block.
    pub fn num_addresses(&self) -> u64 {
        1u64 << (MAX_LENGTH - self.mask)
    }

    /// True if `ip` falls inside this block.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.lo() <= ip && ip <= self.hi()
    }

    /// True if `other` lies entirely inside this block.
    pub fn contains_block(&self, other: &Ipv4) -> bool {
        self.contains(other.lo()) && self.contains(other.hi())
    }

    /// True if the two blocks share at least one address.
    pub fn overlaps(&self, other: &Ipv4) -> bool {
        self.lo() <= other.hi() && other.lo() <= self.hi()
    }

    /// Split the block into equal sub-blocks of length `new_mask`, in
    /// ascending address order.
    ///
    /// ```
    /// use vpc_topology::models::Ipv4;
    /// let vpc = Ipv4::new("10.0.0.0/24").unwrap();
    /// let halves: Vec<String> = vpc.subnets(25).unwrap().map(|s| s.to_string()).collect();
    /// assert_eq!(halves, vec!["10.0.0.0/25", "10.0.0.128/25"]);
    /// ```
    pub fn subnets(&self, new_mask: u8) -> Result<impl Iterator<Item = Ipv4>, Box<dyn Error>> {
        if new_mask > MAX_LENGTH {
            return Err("Network length is too long".into());
        }
        if new_mask < self.mask {
            return Err(format!("Cannot split /{} into larger /{} blocks", self.mask, new_mask).into());
        }
        let count = 1u64 << (new_mask - self.mask);
        let first = Ipv4 {
            addr: self.addr,
            mask: new_mask,
        };
        let blocks = std::iter::successors(Some(first), move |prev| {
            ip_after_subnet(prev.addr, new_mask)
                .ok()
                .map(|addr| Ipv4 {
                    addr,
                    mask: new_mask,
                })
        })
        .take(count as usize);
        Ok(blocks)
    }
}

impl std::fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

impl std::str::FromStr for Ipv4 {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4::new(s)
    }
}

impl PartialEq for Ipv4 {
    fn eq(&self, other: &Ipv4) -> bool {
        self.addr == other.addr && self.mask == other.mask
    }
}

impl PartialOrd for Ipv4 {
    fn partial_cmp(&self, other: &Ipv4) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
