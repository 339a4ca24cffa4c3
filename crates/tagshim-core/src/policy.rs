//! Per-call tagging decisions.

use crate::config::{ReallocPolicy, TagConfig};
use crate::tag::{PresentedAddr, RealAddr};

/// Protection class of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protection {
    Tagged,
    Plain,
}

impl Protection {
    /// Present a real address according to this class.
    #[must_use]
    pub const fn present(self, real: RealAddr, config: &TagConfig) -> PresentedAddr {
        match self {
            Self::Tagged => real.tag(config.mask),
            Self::Plain => real.plain(),
        }
    }
}

/// Class of a fresh allocation, from its single-object size.
///
/// For `calloc` the single-object size is the element size, not the product.
#[must_use]
pub const fn classify_allocation(config: &TagConfig, object_size: usize) -> Protection {
    if config.is_small(object_size) {
        Protection::Tagged
    } else {
        Protection::Plain
    }
}

/// Class of a pointer coming back from the application.
#[must_use]
pub const fn classify_incoming(config: &TagConfig, presented: PresentedAddr) -> Protection {
    if presented.is_tagged(config.mask) {
        Protection::Tagged
    } else {
        Protection::Plain
    }
}

/// Class of a `realloc` result, given the incoming pointer's class.
#[must_use]
pub const fn classify_realloc_result(
    config: &TagConfig,
    incoming: Protection,
    new_size: usize,
) -> Protection {
    match config.realloc_policy {
        ReallocPolicy::Inherit => incoming,
        ReallocPolicy::BySize => classify_allocation(config, new_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_boundary_sits_at_the_threshold() {
        let config = TagConfig::DEFAULT;
        let t = config.small_object_threshold;
        assert_eq!(classify_allocation(&config, t - 1), Protection::Tagged);
        assert_eq!(classify_allocation(&config, t), Protection::Plain);
        assert_eq!(classify_allocation(&config, t + 1), Protection::Plain);
        assert_eq!(classify_allocation(&config, 0), Protection::Tagged);
    }

    #[test]
    fn incoming_class_follows_the_strict_predicate() {
        let config = TagConfig::DEFAULT;
        let real = RealAddr::new(0x7f00_0000_1000);
        assert_eq!(
            classify_incoming(&config, real.tag(config.mask)),
            Protection::Tagged
        );
        assert_eq!(classify_incoming(&config, real.plain()), Protection::Plain);
        assert_eq!(
            classify_incoming(&config, PresentedAddr::NULL),
            Protection::Plain
        );
    }

    #[test]
    fn inherit_policy_keeps_the_incoming_class() {
        let config = TagConfig::DEFAULT;
        assert_eq!(
            classify_realloc_result(&config, Protection::Tagged, 1 << 20),
            Protection::Tagged
        );
        assert_eq!(
            classify_realloc_result(&config, Protection::Plain, 1),
            Protection::Plain
        );
    }

    #[test]
    fn size_policy_reclassifies_by_new_size() {
        let config = TagConfig {
            realloc_policy: ReallocPolicy::BySize,
            ..TagConfig::DEFAULT
        };
        assert_eq!(
            classify_realloc_result(&config, Protection::Tagged, 1 << 20),
            Protection::Plain
        );
        assert_eq!(
            classify_realloc_result(&config, Protection::Plain, 4),
            Protection::Tagged
        );
    }

    #[test]
    fn presenting_null_never_tags() {
        let config = TagConfig::DEFAULT;
        assert!(Protection::Tagged.present(RealAddr::NULL, &config).is_null());
    }
}
