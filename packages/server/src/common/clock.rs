//! Injectable time and ID-generation seams.
//!
//! Every engine that reads the wall clock or mints an ID does so through
//! these traits, so tests can drive the system with a fixed clock and a
//! seeded generator. The real implementations live here; the deterministic
//! ones live in `kernel::test_dependencies`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of unique IDs.
pub trait IdGen: Send + Sync {
    fn new_uuid(&self) -> Uuid;

    /// A random URL-safe token for session IDs and OIDC state values.
    fn new_token(&self) -> String {
        self.new_uuid().simple().to_string()
    }
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time-ordered (v7) UUIDs; the production generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGen;

impl IdGen for RandomIdGen {
    fn new_uuid(&self) -> Uuid {
        Uuid::now_v7()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn token_is_url_safe() {
        let gen = RandomIdGen;
        let token = gen.new_token();
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(token.len() >= 32);
    }
}
