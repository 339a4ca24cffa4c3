//! Machine-readable reports printed by the harness.

use serde::Serialize;
use tagshim_core::predicate::{
    clean_return_address, is_encoded_pointer, is_encoded_return_address, matches_tag,
};
use tagshim_core::tag::{HIGH_BITS_MASK, TAG_SHIFT};
use tagshim_core::{ConfigError, ReallocPolicy, TagConfig, TagMask};

use crate::error::HarnessError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Effective shim configuration for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigReport {
    pub tag: String,
    pub mask: String,
    pub small_object_threshold: usize,
    pub trace: bool,
    pub realloc_policy: ReallocPolicyName,
    /// One line per variable that was set but rejected.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReallocPolicyName {
    Inherit,
    Size,
}

impl From<ReallocPolicy> for ReallocPolicyName {
    fn from(policy: ReallocPolicy) -> Self {
        match policy {
            ReallocPolicy::Inherit => Self::Inherit,
            ReallocPolicy::BySize => Self::Size,
        }
    }
}

impl ConfigReport {
    /// Resolve the configuration the shim would see under `lookup`.
    pub fn resolve<B, L>(lookup: L) -> Self
    where
        B: AsRef<[u8]>,
        L: FnMut(&'static str) -> Option<B>,
    {
        let mut errors: Vec<ConfigError> = Vec::new();
        let config = TagConfig::resolve(lookup, |err| errors.push(err));
        Self::from_config(&config, errors.iter().map(ToString::to_string).collect())
    }

    /// Resolve from this process's environment.
    pub fn from_env() -> Self {
        use std::os::unix::ffi::OsStringExt;
        Self::resolve(|name| std::env::var_os(name).map(OsStringExt::into_vec))
    }

    #[must_use]
    pub fn from_config(config: &TagConfig, warnings: Vec<String>) -> Self {
        Self {
            tag: format!("{:#06x}", config.mask.tag()),
            mask: format!("{:#018x}", config.mask.bits()),
            small_object_threshold: config.small_object_threshold,
            trace: config.trace,
            realloc_policy: config.realloc_policy.into(),
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Address classification
// ---------------------------------------------------------------------------

/// Both predicates applied to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressReport {
    pub input: String,
    pub address: String,
    pub high_bits: String,
    /// Any of bits 48..=63 set.
    pub encoded: bool,
    /// Bits 48..=63 equal the configured tag.
    pub matches_tag: bool,
    /// Address the real allocator would see, when `matches_tag` holds.
    pub real_address: Option<String>,
    pub encoded_return_address: bool,
    pub clean_return_address: String,
}

impl AddressReport {
    #[must_use]
    pub fn classify(input: &str, addr: u64, mask: TagMask) -> Self {
        let matches = matches_tag(addr, mask);
        Self {
            input: input.to_string(),
            address: format!("{addr:#018x}"),
            high_bits: format!("{:#06x}", (addr & HIGH_BITS_MASK) >> TAG_SHIFT),
            encoded: is_encoded_pointer(addr),
            matches_tag: matches,
            real_address: matches.then(|| format!("{:#018x}", addr ^ mask.bits())),
            encoded_return_address: is_encoded_return_address(addr),
            clean_return_address: format!("{:#018x}", clean_return_address(addr)),
        }
    }
}

/// Parse an address: `0x`-prefixed hex or decimal, `_` separators allowed.
pub fn parse_address(raw: &str) -> Result<u64, HarnessError> {
    let s = raw.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        s.replace('_', "").parse::<u64>()
    };
    parsed.map_err(|_| HarnessError::InvalidAddress {
        input: raw.to_string(),
    })
}

/// Classify every input, failing on the first unparsable one.
pub fn classify_all<S: AsRef<str>>(
    inputs: &[S],
    mask: TagMask,
) -> Result<Vec<AddressReport>, HarnessError> {
    inputs
        .iter()
        .map(|raw| {
            let raw = raw.as_ref();
            parse_address(raw).map(|addr| AddressReport::classify(raw, addr, mask))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_matches_builtin_constants() {
        let report = ConfigReport::from_config(&TagConfig::DEFAULT, Vec::new());
        assert_eq!(report.tag, "0x0001");
        assert_eq!(report.mask, "0x0001000000000000");
        assert_eq!(report.small_object_threshold, 11);
        assert_eq!(report.realloc_policy, ReallocPolicyName::Inherit);
    }

    #[test]
    fn rejected_variables_become_warnings() {
        let report = ConfigReport::resolve(|name| match name {
            "TAGSHIM_TAG" => Some("0x0"),
            _ => None,
        });
        assert_eq!(report.tag, "0x0001");
        assert_eq!(report.warnings, vec!["TAGSHIM_TAG: tag must be non-zero"]);
    }

    #[test]
    fn tagged_address_reports_its_real_address() {
        let report = AddressReport::classify("t", 0x0001_5555_0000_1000, TagMask::DEFAULT);
        assert!(report.encoded);
        assert!(report.matches_tag);
        assert_eq!(report.high_bits, "0x0001");
        assert_eq!(report.real_address.as_deref(), Some("0x0000555500001000"));
        assert!(report.encoded_return_address);
        assert_eq!(report.clean_return_address, "0x0000555500001000");
    }

    #[test]
    fn foreign_tag_is_encoded_but_not_ours() {
        let report = AddressReport::classify("f", 0x0002_0000_0000_0040, TagMask::DEFAULT);
        assert!(report.encoded);
        assert!(!report.matches_tag);
        assert_eq!(report.real_address, None);
    }

    #[test]
    fn kernel_half_addresses_are_clean_return_addresses() {
        let report = AddressReport::classify("k", 0xFFFF_8000_0000_0000, TagMask::DEFAULT);
        assert!(report.encoded);
        assert!(!report.encoded_return_address);
        assert_eq!(report.clean_return_address, "0xffff800000000000");
    }

    #[test]
    fn addresses_parse_in_hex_and_decimal() {
        assert_eq!(parse_address("0x0001_0000_0000_1000").unwrap(), 0x0001_0000_0000_1000);
        assert_eq!(parse_address(" 4096 ").unwrap(), 4096);
        assert!(matches!(
            parse_address("0xZZ"),
            Err(HarnessError::InvalidAddress { .. })
        ));
    }
}
