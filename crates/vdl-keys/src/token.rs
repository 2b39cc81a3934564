use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// A unique, time-ordered identifier assigned to every write.
///
/// The value packs wall-clock milliseconds into the high 48 bits and a
/// per-millisecond counter into the low 16 bits, so numeric order equals
/// issue order for tokens produced by one [`TokenClock`]. Tokens render as
/// exactly 16 lowercase hex digits, which makes lexicographic order of the
/// rendered form equal to numeric order — the property the store's reverse
/// scans rely on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(u64);

/// Rendered width of a token, in characters.
pub const TOKEN_LEN: usize = 16;

const COUNTER_BITS: u32 = 16;

impl VersionToken {
    /// Build a token from wall-clock milliseconds and a tie-break counter.
    pub fn from_parts(millis: u64, counter: u16) -> Self {
        Self((millis << COUNTER_BITS) | u64::from(counter))
    }

    /// The raw packed value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Wall-clock milliseconds component.
    pub fn millis(&self) -> u64 {
        self.0 >> COUNTER_BITS
    }

    /// Tie-break counter component.
    pub fn counter(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// Parse exactly `TOKEN_LEN` lowercase hex digits.
    pub fn parse(s: &str) -> KeyResult<Self> {
        if s.len() != TOKEN_LEN || !s.bytes().all(is_lower_hex) {
            return Err(KeyError::Malformed(format!(
                "token must be {TOKEN_LEN} lowercase hex digits, got {s:?}"
            )));
        }
        // All-hex by the check above, so this cannot fail.
        let value = u64::from_str_radix(s, 16)
            .map_err(|e| KeyError::Malformed(e.to_string()))?;
        Ok(Self(value))
    }
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({}ms.{})", self.millis(), self.counter())
    }
}

impl FromStr for VersionToken {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionToken {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionToken> for String {
    fn from(t: VersionToken) -> String {
        t.to_string()
    }
}

/// Issues strictly increasing [`VersionToken`]s for one store instance.
///
/// If wall time has not advanced past the last issued token (same
/// millisecond, or the clock stepped backwards), the packed value is bumped
/// by one instead, so two calls never return the same token and later calls
/// always compare greater.
#[derive(Clone, Debug, Default)]
pub struct TokenClock {
    last: Arc<Mutex<u64>>,
}

impl TokenClock {
    /// Create a clock with no issued tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token.
    pub fn next(&self) -> VersionToken {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let candidate = now_ms << COUNTER_BITS;

        let mut last = self.last.lock().expect("lock poisoned");
        let value = if candidate > *last { candidate } else { *last + 1 };
        *last = value;
        VersionToken(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_fixed_width_hex() {
        let t = VersionToken::from_parts(1, 0);
        assert_eq!(t.to_string().len(), TOKEN_LEN);
        assert_eq!(t.to_string(), "0000000000010000");
    }

    #[test]
    fn parse_roundtrip() {
        let t = VersionToken::from_parts(1_700_000_000_123, 7);
        let parsed = VersionToken::parse(&t.to_string()).unwrap();
        assert_eq!(parsed, t);
        assert_eq!(parsed.millis(), 1_700_000_000_123);
        assert_eq!(parsed.counter(), 7);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(VersionToken::parse("").is_err());
        assert!(VersionToken::parse("0000000000010000ff").is_err());
        assert!(VersionToken::parse("000000000001000G").is_err());
        // Uppercase hex never round-trips, so it is rejected too.
        assert!(VersionToken::parse("000000000001000F").is_err());
    }

    #[test]
    fn serde_roundtrips_through_json() {
        let t = VersionToken::from_parts(42, 3);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, format!("\"{t}\""));
        let back: VersionToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<VersionToken>("\"XYZ\"").is_err());
    }

    #[test]
    fn numeric_order_matches_string_order() {
        let a = VersionToken::from_parts(10, 0);
        let b = VersionToken::from_parts(10, 1);
        let c = VersionToken::from_parts(11, 0);
        assert!(a < b && b < c);
        assert!(a.to_string() < b.to_string());
        assert!(b.to_string() < c.to_string());
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = TokenClock::new();
        let mut prev = clock.next();
        // Tight loop forces same-millisecond issuance.
        for _ in 0..10_000 {
            let next = clock.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn clock_handles_cloned_handles() {
        let clock = TokenClock::new();
        let other = clock.clone();
        let a = clock.next();
        let b = other.next();
        assert!(b > a);
    }
}
