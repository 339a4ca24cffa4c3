//! Startup configuration.
//!
//! The tag and small-object threshold default to built-in constants. Each
//! setting may be overridden once per process through the environment:
//! - `TAGSHIM_TAG`: 16-bit tag, `0x`-prefixed hex or decimal, non-zero.
//! - `TAGSHIM_SMALL_THRESHOLD`: allocations strictly below this many bytes
//!   are tagged.
//! - `TAGSHIM_TRACE`: per-call trace on stderr.
//! - `TAGSHIM_REALLOC_POLICY`: `inherit` (default) or `size`.
//!
//! Parsing never allocates, so the ABI layer can run it from inside `malloc`.

use crate::error::ConfigError;
use crate::tag::TagMask;

pub const ENV_TAG: &str = "TAGSHIM_TAG";
pub const ENV_SMALL_THRESHOLD: &str = "TAGSHIM_SMALL_THRESHOLD";
pub const ENV_TRACE: &str = "TAGSHIM_TRACE";
pub const ENV_REALLOC_POLICY: &str = "TAGSHIM_REALLOC_POLICY";

/// Allocations strictly smaller than this are tagged by default.
pub const DEFAULT_SMALL_THRESHOLD: usize = 11;

/// How `realloc` decides whether its result is tagged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReallocPolicy {
    /// The result keeps the incoming pointer's protection class, whatever the
    /// new size.
    #[default]
    Inherit,
    /// The result is classified by the new size, like a fresh allocation.
    BySize,
}

impl ReallocPolicy {
    pub fn parse(raw: &[u8]) -> Result<Self, ConfigError> {
        let var = ENV_REALLOC_POLICY;
        let value = as_trimmed_str(raw, var)?;
        if value.eq_ignore_ascii_case("inherit") {
            Ok(Self::Inherit)
        } else if value.eq_ignore_ascii_case("size") || value.eq_ignore_ascii_case("by-size") {
            Ok(Self::BySize)
        } else {
            Err(ConfigError::InvalidReallocPolicy { var })
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::BySize => "size",
        }
    }
}

/// Process-wide tagging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagConfig {
    pub mask: TagMask,
    pub small_object_threshold: usize,
    pub trace: bool,
    pub realloc_policy: ReallocPolicy,
}

impl TagConfig {
    pub const DEFAULT: Self = Self {
        mask: TagMask::DEFAULT,
        small_object_threshold: DEFAULT_SMALL_THRESHOLD,
        trace: false,
        realloc_policy: ReallocPolicy::Inherit,
    };

    /// True if a single object of `size` bytes is eligible for tagging.
    #[inline]
    #[must_use]
    pub const fn is_small(&self, size: usize) -> bool {
        size < self.small_object_threshold
    }

    /// Build a configuration from an environment-like lookup.
    ///
    /// Variables are handled independently: an unset variable keeps its
    /// default, and an invalid one is passed to `report` and keeps its default.
    pub fn resolve<B, L, R>(mut lookup: L, mut report: R) -> Self
    where
        B: AsRef<[u8]>,
        L: FnMut(&'static str) -> Option<B>,
        R: FnMut(ConfigError),
    {
        let mut config = Self::DEFAULT;

        if let Some(raw) = lookup(ENV_TAG) {
            match parse_tag(raw.as_ref()) {
                Ok(mask) => config.mask = mask,
                Err(err) => report(err),
            }
        }
        if let Some(raw) = lookup(ENV_SMALL_THRESHOLD) {
            match parse_threshold(raw.as_ref()) {
                Ok(threshold) => config.small_object_threshold = threshold,
                Err(err) => report(err),
            }
        }
        if let Some(raw) = lookup(ENV_TRACE) {
            match parse_flag(raw.as_ref(), ENV_TRACE) {
                Ok(trace) => config.trace = trace,
                Err(err) => report(err),
            }
        }
        if let Some(raw) = lookup(ENV_REALLOC_POLICY) {
            match ReallocPolicy::parse(raw.as_ref()) {
                Ok(policy) => config.realloc_policy = policy,
                Err(err) => report(err),
            }
        }

        config
    }
}

impl Default for TagConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parse a 16-bit tag: `0x`-prefixed hex or decimal.
pub fn parse_tag(raw: &[u8]) -> Result<TagMask, ConfigError> {
    let var = ENV_TAG;
    let value = as_trimmed_str(raw, var)?;
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    };
    let tag = parsed.map_err(|_| ConfigError::InvalidTag { var })?;
    TagMask::from_tag(tag).ok_or(ConfigError::ZeroTag { var })
}

/// Parse a small-object threshold in bytes.
pub fn parse_threshold(raw: &[u8]) -> Result<usize, ConfigError> {
    let var = ENV_SMALL_THRESHOLD;
    as_trimmed_str(raw, var)?
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidThreshold { var })
}

/// Parse a boolean switch (case-insensitive).
pub fn parse_flag(raw: &[u8], var: &'static str) -> Result<bool, ConfigError> {
    let value = as_trimmed_str(raw, var)?;
    const ON: [&str; 4] = ["1", "true", "on", "yes"];
    const OFF: [&str; 4] = ["0", "false", "off", "no"];
    if ON.iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Ok(true)
    } else if OFF.iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Ok(false)
    } else {
        Err(ConfigError::InvalidFlag { var })
    }
}

fn as_trimmed_str<'a>(raw: &'a [u8], var: &'static str) -> Result<&'a str, ConfigError> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|_| ConfigError::NotUtf8 { var })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(
        vars: &'a [(&'static str, &'a str)],
    ) -> impl FnMut(&'static str) -> Option<&'a [u8]> {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_bytes())
        }
    }

    #[test]
    fn defaults_match_builtin_constants() {
        let config = TagConfig::default();
        assert_eq!(config.mask.bits(), 0x0001_0000_0000_0000);
        assert_eq!(config.small_object_threshold, 11);
        assert!(!config.trace);
        assert_eq!(config.realloc_policy, ReallocPolicy::Inherit);
    }

    #[test]
    fn threshold_is_exclusive() {
        let config = TagConfig::DEFAULT;
        assert!(config.is_small(0));
        assert!(config.is_small(10));
        assert!(!config.is_small(11));
        assert!(!config.is_small(4096));
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let mut errors = Vec::new();
        let config = TagConfig::resolve(lookup(&[]), |e| errors.push(e));
        assert_eq!(config, TagConfig::DEFAULT);
        assert!(errors.is_empty());
    }

    #[test]
    fn every_variable_can_be_overridden() {
        let vars = [
            (ENV_TAG, "0x00A5"),
            (ENV_SMALL_THRESHOLD, " 64 "),
            (ENV_TRACE, "ON"),
            (ENV_REALLOC_POLICY, "size"),
        ];
        let mut errors = Vec::new();
        let config = TagConfig::resolve(lookup(&vars), |e| errors.push(e));
        assert!(errors.is_empty());
        assert_eq!(config.mask.tag(), 0x00A5);
        assert_eq!(config.small_object_threshold, 64);
        assert!(config.trace);
        assert_eq!(config.realloc_policy, ReallocPolicy::BySize);
    }

    #[test]
    fn invalid_values_are_reported_and_keep_defaults() {
        let vars = [
            (ENV_TAG, "0"),
            (ENV_SMALL_THRESHOLD, "-3"),
            (ENV_TRACE, "maybe"),
            (ENV_REALLOC_POLICY, "shrink"),
        ];
        let mut errors = Vec::new();
        let config = TagConfig::resolve(lookup(&vars), |e| errors.push(e));
        assert_eq!(config, TagConfig::DEFAULT);
        assert_eq!(
            errors,
            vec![
                ConfigError::ZeroTag { var: ENV_TAG },
                ConfigError::InvalidThreshold { var: ENV_SMALL_THRESHOLD },
                ConfigError::InvalidFlag { var: ENV_TRACE },
                ConfigError::InvalidReallocPolicy { var: ENV_REALLOC_POLICY },
            ]
        );
    }

    #[test]
    fn tag_parser_accepts_hex_and_decimal() {
        assert_eq!(parse_tag(b"0x1").map(TagMask::tag), Ok(1));
        assert_eq!(parse_tag(b"0XFFFF").map(TagMask::tag), Ok(0xFFFF));
        assert_eq!(parse_tag(b"257").map(TagMask::tag), Ok(257));
        assert_eq!(parse_tag(b"0x10000"), Err(ConfigError::InvalidTag { var: ENV_TAG }));
        assert_eq!(parse_tag(b"tag"), Err(ConfigError::InvalidTag { var: ENV_TAG }));
        assert_eq!(parse_tag(&[0xff, 0xfe]), Err(ConfigError::NotUtf8 { var: ENV_TAG }));
    }

    #[test]
    fn values_are_trimmed_without_copying() {
        let raw = b"  inherit \n".to_vec();
        let value = as_trimmed_str(&raw, ENV_REALLOC_POLICY).unwrap();
        assert_eq!(value, "inherit");
        assert_eq!(
            as_trimmed_str(&[0xc0], ENV_TRACE),
            Err(ConfigError::NotUtf8 { var: ENV_TRACE })
        );
    }

    #[test]
    fn realloc_policy_round_trips_through_its_name() {
        for policy in [ReallocPolicy::Inherit, ReallocPolicy::BySize] {
            assert_eq!(ReallocPolicy::parse(policy.as_str().as_bytes()), Ok(policy));
        }
    }
}
