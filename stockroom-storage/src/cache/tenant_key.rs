//! Tenant-scoped availability cache keys.
//!
//! `TenantScopedKey` has a private inner struct, so the only way to build one
//! is through [`TenantScopedKey::new`], which demands a tenant id. Cache
//! backends only accept these keys, so a lookup without a tenant does not
//! compile.

use std::fmt;
use stockroom_core::{ProductId, TenantId};
use uuid::Uuid;

/// Separator byte between tenant_id and product_id.
const SEPARATOR: u8 = 0xFF;

/// Namespace of the text form.
const TEXT_NAMESPACE: &str = "inventory";

/// Length of an encoded key.
pub const ENCODED_KEY_LEN: usize = 33;

/// Length of an encoded tenant prefix.
pub const TENANT_PREFIX_LEN: usize = 17;

/// A cache key that is scoped to a specific tenant.
///
/// # Binary Format
///
/// The key encodes to a fixed 33-byte array:
/// - Bytes 0-15: tenant_id (UUID as bytes)
/// - Byte 16: separator (0xFF)
/// - Bytes 17-32: product_id (UUID as bytes)
///
/// Keys sort by tenant first, so a tenant's entries form one contiguous
/// range in an ordered store.
///
/// # Text Format
///
/// `inventory:{tenant_id}:{product_id}` for stores addressed by string keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantScopedKey {
    inner: TenantKeyInner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct TenantKeyInner {
    tenant_id: TenantId,
    product_id: ProductId,
}

impl TenantScopedKey {
    /// Create a new tenant-scoped cache key.
    pub fn new(tenant_id: TenantId, product_id: ProductId) -> Self {
        Self {
            inner: TenantKeyInner {
                tenant_id,
                product_id,
            },
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.inner.product_id
    }

    /// Encode this key to a fixed-size byte array.
    ///
    /// Format: [tenant_id: 16 bytes][separator: 1 byte][product_id: 16 bytes]
    pub fn encode(&self) -> [u8; ENCODED_KEY_LEN] {
        let mut bytes = [0u8; ENCODED_KEY_LEN];
        bytes[0..16].copy_from_slice(self.inner.tenant_id.as_bytes());
        bytes[16] = SEPARATOR;
        bytes[17..33].copy_from_slice(self.inner.product_id.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the slice is not exactly 33 bytes or the separator
    /// byte is wrong.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ENCODED_KEY_LEN || bytes[16] != SEPARATOR {
            return None;
        }

        let tenant_id = Uuid::from_slice(&bytes[0..16]).ok()?;
        let product_id = Uuid::from_slice(&bytes[17..33]).ok()?;

        Some(Self::new(tenant_id, product_id))
    }

    /// Prefix shared by every encoded key of a tenant.
    pub fn tenant_prefix(tenant_id: TenantId) -> [u8; TENANT_PREFIX_LEN] {
        let mut prefix = [0u8; TENANT_PREFIX_LEN];
        prefix[0..16].copy_from_slice(tenant_id.as_bytes());
        prefix[16] = SEPARATOR;
        prefix
    }

    /// Text prefix shared by every key of a tenant: `inventory:{tenant_id}:`.
    pub fn tenant_text_prefix(tenant_id: TenantId) -> String {
        format!("{}:{}:", TEXT_NAMESPACE, tenant_id)
    }

    /// Parse the text form produced by `Display`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(':');
        if parts.next()? != TEXT_NAMESPACE {
            return None;
        }
        let tenant_id = Uuid::parse_str(parts.next()?).ok()?;
        let product_id = Uuid::parse_str(parts.next()?).ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(tenant_id, product_id))
    }
}

impl fmt::Display for TenantScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            TEXT_NAMESPACE, self.inner.tenant_id, self.inner.product_id
        )
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn uuid_strategy() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: decoding an encoded key yields the same key.
        #[test]
        fn prop_encode_decode_roundtrip(
            tenant_id in uuid_strategy(),
            product_id in uuid_strategy(),
        ) {
            let key = TenantScopedKey::new(tenant_id, product_id);
            prop_assert_eq!(TenantScopedKey::decode(&key.encode()), Some(key));
            prop_assert_eq!(TenantScopedKey::parse(&key.to_string()), Some(key));
        }

        /// Property: distinct keys never share an encoding.
        #[test]
        fn prop_encoding_is_injective(
            tenant1 in uuid_strategy(),
            tenant2 in uuid_strategy(),
            product1 in uuid_strategy(),
            product2 in uuid_strategy(),
        ) {
            let key1 = TenantScopedKey::new(tenant1, product1);
            let key2 = TenantScopedKey::new(tenant2, product2);
            prop_assert_eq!(key1 == key2, key1.encode() == key2.encode());
        }

        /// Property: the tenant prefix is a prefix of every key of that tenant,
        /// in both forms.
        #[test]
        fn prop_tenant_prefix_is_prefix(
            tenant_id in uuid_strategy(),
            product_id in uuid_strategy(),
        ) {
            let key = TenantScopedKey::new(tenant_id, product_id);
            prop_assert!(key.encode().starts_with(&TenantScopedKey::tenant_prefix(tenant_id)));
            prop_assert!(key
                .to_string()
                .starts_with(&TenantScopedKey::tenant_text_prefix(tenant_id)));
        }

        /// Property: decode never panics on arbitrary input.
        #[test]
        fn prop_decode_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let decoded = TenantScopedKey::decode(&bytes);
            if let Some(key) = decoded {
                prop_assert_eq!(&key.encode()[..], &bytes[..]);
            }
        }
    }
}
