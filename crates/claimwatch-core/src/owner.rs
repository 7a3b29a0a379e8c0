//! Owner display-name resolution
//!
//! The host knows how to turn an owner id into a display name. Lookups may
//! fail at any time; callers always get a usable string back.

use tracing::trace;

use crate::{ClaimError, ClaimResult, OwnerId};

/// Name shown when a record carries no owner at all
pub const UNKNOWN_OWNER: &str = "Unknown";

/// Resolves an owner id to its current display name
pub trait OwnerNameResolver: Send + Sync {
    fn resolve(&self, owner: OwnerId) -> ClaimResult<String>;
}

impl<F> OwnerNameResolver for F
where
    F: Fn(OwnerId) -> Option<String> + Send + Sync,
{
    fn resolve(&self, owner: OwnerId) -> ClaimResult<String> {
        self(owner).ok_or_else(|| ClaimError::NameResolution {
            owner,
            reason: "owner not known to host".into(),
        })
    }
}

/// Resolver that knows no names; every lookup falls back to the placeholder
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderNames;

impl OwnerNameResolver for PlaceholderNames {
    fn resolve(&self, owner: OwnerId) -> ClaimResult<String> {
        Err(ClaimError::NameResolution {
            owner,
            reason: "no resolver installed".into(),
        })
    }
}

/// Display name for an optional owner, never failing.
///
/// Failed or empty lookups fall back to the truncated owner id.
pub fn display_name(resolver: &dyn OwnerNameResolver, owner: Option<OwnerId>) -> String {
    let Some(owner) = owner else {
        return UNKNOWN_OWNER.to_string();
    };
    match resolver.resolve(owner) {
        Ok(name) if !name.trim().is_empty() => name,
        Ok(_) => owner.short(),
        Err(err) => {
            trace!(%owner, error = %err, "owner name lookup fell back to placeholder");
            owner.short()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_display_name_fallbacks() {
        let known = OwnerId::new(Uuid::from_u128(0xaaaa_bbbb_0000_0000_0000_0000_0000_0001));
        let unknown = OwnerId::new(Uuid::from_u128(0xcccc_dddd_0000_0000_0000_0000_0000_0002));
        let resolver = move |owner: OwnerId| (owner == known).then(|| "Builders".to_string());

        assert_eq!(display_name(&resolver, Some(known)), "Builders");
        assert_eq!(display_name(&resolver, Some(unknown)), "ccccdddd");
        assert_eq!(display_name(&resolver, None), UNKNOWN_OWNER);
        assert_eq!(display_name(&PlaceholderNames, Some(known)), "aaaabbbb");
    }

    #[test]
    fn test_blank_name_falls_back() {
        let owner = OwnerId::new(Uuid::from_u128(0x1234_5678_0000_0000_0000_0000_0000_0000));
        let resolver = |_: OwnerId| Some("   ".to_string());
        assert_eq!(display_name(&resolver, Some(owner)), "12345678");
    }
}
