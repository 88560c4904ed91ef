//! Pattern-set validation and normalisation
//!
//! Mainnet P2PK addresses always start with '9' and their second character
//! falls in {e, f, g, h, i} (the 0x01 prefix byte plus the 0x02/0x03 pubkey
//! tag pin the second Base58 digit into a narrow range), so hopeless
//! patterns are rejected before any GPU work.

use crate::error::ConfigError;
use crate::{MAX_PATTERNS, MAX_PATTERN_DATA, MAX_PATTERN_LEN};

/// Base58 alphabet (excludes 0, O, I, l)
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Valid second characters for Ergo mainnet P2PK addresses
const VALID_SECOND_CHARS: &[char] = &['e', 'f', 'g', 'h', 'i'];

/// A validated set of vanity prefixes.
///
/// `normalized` is what the GPU matches against (lowercased when
/// `ignore_case`); `originals` is kept verbatim for display.
#[derive(Debug, Clone)]
pub struct PatternSet {
    originals: Vec<String>,
    normalized: Vec<String>,
    ignore_case: bool,
}

impl PatternSet {
    /// Validate and normalise a list of patterns.
    pub fn new(patterns: &[String], ignore_case: bool) -> Result<Self, ConfigError> {
        let originals: Vec<String> = patterns
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if originals.is_empty() {
            return Err(ConfigError::NoPatterns);
        }
        if originals.len() > MAX_PATTERNS {
            return Err(ConfigError::TooManyPatterns {
                count: originals.len(),
                max: MAX_PATTERNS,
            });
        }

        let total: usize = originals.iter().map(|p| p.len()).sum();
        if total > MAX_PATTERN_DATA {
            return Err(ConfigError::PatternDataTooLarge {
                total,
                max: MAX_PATTERN_DATA,
            });
        }

        let mut normalized = Vec::with_capacity(originals.len());
        for pattern in &originals {
            normalized.push(validate_pattern(pattern, ignore_case)?);
        }

        Ok(Self {
            originals,
            normalized,
            ignore_case,
        })
    }

    /// Patterns as the user typed them.
    pub fn originals(&self) -> &[String] {
        &self.originals
    }

    /// Patterns as uploaded to the GPU.
    pub fn normalized(&self) -> &[String] {
        &self.normalized
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Check an address against pattern `index`, mirroring the GPU's case
    /// mode. Used when re-verifying hits on the host.
    pub fn matches(&self, index: usize, address: &str) -> bool {
        let Some(pattern) = self.normalized.get(index) else {
            return false;
        };
        if self.ignore_case {
            address
                .get(..pattern.len())
                .map(|prefix| prefix.eq_ignore_ascii_case(pattern))
                .unwrap_or(false)
        } else {
            address.starts_with(pattern.as_str())
        }
    }

    /// Concatenated pattern bytes plus offset/length tables for GPU upload.
    pub fn to_gpu_tables(&self) -> (Vec<u8>, Vec<u32>, Vec<u32>) {
        let mut data = Vec::with_capacity(MAX_PATTERN_DATA);
        let mut offsets = Vec::with_capacity(self.normalized.len());
        let mut lens = Vec::with_capacity(self.normalized.len());
        for pattern in &self.normalized {
            offsets.push(data.len() as u32);
            lens.push(pattern.len() as u32);
            data.extend_from_slice(pattern.as_bytes());
        }
        (data, offsets, lens)
    }
}

/// Validate a single pattern; returns the normalised form.
fn validate_pattern(pattern: &str, ignore_case: bool) -> Result<String, ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(ConfigError::PatternTooLong {
            pattern: pattern.to_string(),
            len: pattern.len(),
            max: MAX_PATTERN_LEN,
        });
    }
    if !pattern.is_ascii() {
        return Err(ConfigError::NonAsciiPattern(pattern.to_string()));
    }

    for c in pattern.chars() {
        if !BASE58_ALPHABET.contains(c) {
            return Err(ConfigError::InvalidBase58Char {
                pattern: pattern.to_string(),
                ch: c,
            });
        }
    }

    let chars: Vec<char> = pattern.chars().collect();

    if chars[0] != '9' {
        return Err(ConfigError::ImpossiblePrefix(pattern.to_string()));
    }

    if chars.len() >= 2 {
        let second = if ignore_case {
            chars[1].to_ascii_lowercase()
        } else {
            chars[1]
        };

        if !VALID_SECOND_CHARS.contains(&second) {
            let upper_valid: Vec<char> = VALID_SECOND_CHARS
                .iter()
                .map(|c| c.to_ascii_uppercase())
                .collect();
            if !ignore_case && upper_valid.contains(&chars[1]) {
                return Err(ConfigError::UppercaseSecondChar {
                    pattern: pattern.to_string(),
                    ch: chars[1],
                    lower: chars[1].to_ascii_lowercase(),
                });
            }
            return Err(ConfigError::ImpossiblePrefix(pattern.to_string()));
        }
    }

    if ignore_case {
        Ok(pattern.to_lowercase())
    } else {
        Ok(pattern.to_string())
    }
}
