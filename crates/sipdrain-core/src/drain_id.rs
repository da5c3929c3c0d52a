//! Drain id derivation.
//!
//! A drain id binds one scale-in attempt to its drain lifecycle. Repeated
//! notifications for the same task inside one bucket hash to the same id,
//! so redelivered events collapse onto a single drain.

use sha2::{Digest, Sha256};

/// Width of the deduplication bucket in seconds.
pub const DRAIN_BUCKET_SECS: u64 = 600;

/// `hex(sha256("{task_arn}:{now / 600}"))[..16]`
pub fn drain_id(task_arn: &str, now: u64) -> String {
    let bucket = now / DRAIN_BUCKET_SECS;
    let digest = Sha256::digest(format!("{task_arn}:{bucket}").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK: &str = "arn:aws:ecs:us-east-1:123456789012:task/voice/0f1e2d3c";

    #[test]
    fn same_bucket_same_id() {
        let base = 1_700_000_400; // bucket boundary
        assert_eq!(base % DRAIN_BUCKET_SECS, 0);
        assert_eq!(drain_id(TASK, base), drain_id(TASK, base + 599));
    }

    #[test]
    fn next_bucket_differs() {
        let base = 1_700_000_400;
        assert_ne!(drain_id(TASK, base + 599), drain_id(TASK, base + 600));
    }

    #[test]
    fn different_tasks_differ() {
        let now = 1_700_000_000;
        assert_ne!(drain_id(TASK, now), drain_id("arn:other-task", now));
    }

    #[test]
    fn id_is_sixteen_hex_chars() {
        let id = drain_id(TASK, 42);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
