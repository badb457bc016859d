//! Deterministic split of the inventory between independent job instances.
//!
//! Hosts are sorted by identifier and dealt round-robin: the host at sorted
//! position `i` belongs to shard `(i % count) + 1`. Because only the sorted
//! identifiers matter, N instances launched with `1/N .. N/N` cover the fleet
//! exactly once without talking to each other.

use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    index: u32,
    count: u32,
}

impl Shard {
    /// `index` is 1-based and must lie in `[1, count]`.
    pub fn new(index: u32, count: u32) -> Result<Self, ConfigError> {
        if index == 0 || index > count {
            return Err(ConfigError::ShardOutOfRange { index, count });
        }
        Ok(Self { index, count })
    }

    /// Parses an `index/count` descriptor; `offset` shifts a 0-based index
    /// to the 1-based one used internally.
    pub fn parse(descriptor: &str, offset: bool) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedShard(descriptor.to_string());
        let parts: Vec<&str> = descriptor.split('/').collect();
        let [index, count] = parts.as_slice() else {
            return Err(malformed());
        };
        let index: u32 = index.trim().parse().map_err(|_| malformed())?;
        let count: u32 = count.trim().parse().map_err(|_| malformed())?;
        let index = if offset { index.checked_add(1).ok_or_else(malformed)? } else { index };
        Self::new(index, count)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Keeps the hosts this shard owns, in sorted order.
    pub fn select<K, I>(&self, hosts: I) -> Vec<K>
    where
        K: Ord,
        I: IntoIterator<Item = K>,
    {
        let mut sorted: Vec<K> = hosts.into_iter().collect();
        sorted.sort();
        let count = self.count as usize;
        let slot = (self.index - 1) as usize;
        sorted
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % count == slot)
            .map(|(_, host)| host)
            .collect()
    }
}

pub fn partition<K, I>(index: u32, count: u32, hosts: I) -> Result<Vec<K>, ConfigError>
where
    K: Ord,
    I: IntoIterator<Item = K>,
{
    Ok(Shard::new(index, count)?.select(hosts))
}
