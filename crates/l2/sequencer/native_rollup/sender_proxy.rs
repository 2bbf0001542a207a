//! CREATE2 address derivation for the two proxy families, and the
//! `proxy_cache` DFR keeps of L1-address -> SenderProxyL2-on-L2 addresses.
//!
//! Bit-exact with the on-chain derivation (§6 of the design): any off-chain
//! computation of a proxy address must agree with what the deployer contract
//! produces, for every input address.

use std::collections::HashMap;

use ethrex_common::{Address, H256};
use ethrex_common::utils::keccak;
use ethrex_l2_common::bridging::{sender_proxy_l1_salt_prefix, sender_proxy_l2_salt_prefix};

/// `keccak(0xff ++ deployer ++ salt ++ keccak(init_code))`, truncated to the
/// low 20 bytes — the standard CREATE2 address formula, mirroring
/// `contracts/deployer.rs::create2_address`.
pub fn create2_address(deployer: Address, salt: H256, init_code_hash: H256) -> Address {
    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(deployer.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(init_code_hash.as_bytes());
    let hash = keccak(preimage);
    // keccak output is 32 bytes; the address is the low 20.
    Address::from_slice(&hash.as_bytes()[12..32])
}

/// Deterministic per-L2-address proxy on L1, owned exclusively by STC.
/// `salt = keccak(SALT_PREFIX_L1, l2_address)`.
pub fn sender_proxy_l1_salt(l2_address: Address) -> H256 {
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(sender_proxy_l1_salt_prefix().as_bytes());
    preimage.extend_from_slice(l2_address.as_bytes());
    keccak(preimage)
}

pub fn sender_proxy_l1_address(
    stc_address: Address,
    l2_address: Address,
    proxy_init_code_hash: H256,
) -> Address {
    create2_address(
        stc_address,
        sender_proxy_l1_salt(l2_address),
        proxy_init_code_hash,
    )
}

/// Deterministic per-L1-address proxy on L2, produced by the
/// `SenderProxyL2Factory` system singleton. `salt = keccak(SALT_PREFIX_L2,
/// l1_address)`.
pub fn sender_proxy_l2_salt(l1_address: Address) -> H256 {
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(sender_proxy_l2_salt_prefix().as_bytes());
    preimage.extend_from_slice(l1_address.as_bytes());
    keccak(preimage)
}

pub fn sender_proxy_l2_address(
    factory_address: Address,
    l1_address: Address,
    proxy_init_code_hash: H256,
) -> Address {
    create2_address(
        factory_address,
        sender_proxy_l2_salt(l1_address),
        proxy_init_code_hash,
    )
}

/// DFR's cache of L1 address -> SenderProxyL2 address, so the replay loop
/// doesn't recompute (or re-deploy) a proxy it has already ensured exists.
/// Snapshotted by value on `snapshot()` and restored verbatim on `revert()`
/// so a reverted simulation leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct ProxyCache {
    l1_to_l2_proxy: HashMap<Address, Address>,
}

impl ProxyCache {
    pub fn get(&self, l1_address: Address) -> Option<Address> {
        self.l1_to_l2_proxy.get(&l1_address).copied()
    }

    pub fn insert(&mut self, l1_address: Address, proxy_address: Address) {
        self.l1_to_l2_proxy.insert(l1_address, proxy_address);
    }

    /// Shallow copy used as a snapshot; cheap since the map is small relative
    /// to full execution-environment state.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: Self) {
        *self = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn proxy_address_is_pure_function_of_inputs() {
        let deployer = addr(0xaa);
        let init_code_hash = H256::repeat_byte(0x11);
        let a = sender_proxy_l1_address(deployer, addr(1), init_code_hash);
        let b = sender_proxy_l1_address(deployer, addr(1), init_code_hash);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_l2_addresses_get_distinct_proxies() {
        let deployer = addr(0xaa);
        let init_code_hash = H256::repeat_byte(0x11);
        let a = sender_proxy_l1_address(deployer, addr(1), init_code_hash);
        let b = sender_proxy_l1_address(deployer, addr(2), init_code_hash);
        assert_ne!(a, b);
    }

    #[test]
    fn l1_and_l2_salts_never_collide_for_same_address() {
        // Same address used as both an L2 address (for the L1 proxy family)
        // and an L1 address (for the L2 proxy family) must not derive the
        // same salt, since the two constants start from different prefixes.
        let a = sender_proxy_l1_salt(addr(7));
        let b = sender_proxy_l2_salt(addr(7));
        assert_ne!(a, b);
    }

    #[test]
    fn proxy_cache_round_trips_through_snapshot_restore() {
        let mut cache = ProxyCache::default();
        cache.insert(addr(1), addr(2));
        let snapshot = cache.snapshot();

        cache.insert(addr(3), addr(4));
        assert_eq!(cache.get(addr(3)), Some(addr(4)));

        cache.restore(snapshot);
        assert_eq!(cache.get(addr(3)), None);
        assert_eq!(cache.get(addr(1)), Some(addr(2)));
    }
}
