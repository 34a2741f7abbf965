//! telemetry/counters.rs
//! Counters accumulated while reading a stream.
//!
//! Summary: one `ReadCounters` per reader; nested EC readers are merged into
//! their parent, and a fragment tree keeps the total after its backing
//! reader is released.

use std::ops::AddAssign;

use serde::Serialize;

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadCounters {
    pub containers: u64,
    pub primitives: u64,
    pub comments: u64,
    pub padding: u64,
    /// Primitive payload bytes (length prefixes excluded).
    pub payload_bytes: u64,
    /// Containers passed over without materializing them.
    pub skipped_containers: u64,
    pub ec_compressed: u64,
    pub ec_encrypted: u64,
    pub bytes_inflated: u64,
    pub bytes_decrypted: u64,
    pub checksum_mismatches: u64,
}

impl ReadCounters {
    pub fn add_primitive(&mut self, payload_len: usize) {
        self.primitives += 1;
        self.payload_bytes += payload_len as u64;
    }

    /// Record one decoded EC node.
    pub fn add_ec(&mut self, compressed: bool, content_len: usize) {
        if compressed {
            self.ec_compressed += 1;
            self.bytes_inflated += content_len as u64;
        } else {
            self.ec_encrypted += 1;
            self.bytes_decrypted += content_len as u64;
        }
    }

    pub fn merge(&mut self, other: &ReadCounters) {
        self.containers += other.containers;
        self.primitives += other.primitives;
        self.comments += other.comments;
        self.padding += other.padding;
        self.payload_bytes += other.payload_bytes;
        self.skipped_containers += other.skipped_containers;
        self.ec_compressed += other.ec_compressed;
        self.ec_encrypted += other.ec_encrypted;
        self.bytes_inflated += other.bytes_inflated;
        self.bytes_decrypted += other.bytes_decrypted;
        self.checksum_mismatches += other.checksum_mismatches;
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl AddAssign for ReadCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
