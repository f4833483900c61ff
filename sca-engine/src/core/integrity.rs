//! Integrity/dedup store (C5, §4.4).
//!
//! One owning container (the scan-order `Vec`), one index-only view (the
//! check-id `HashMap`) — per the "never two owners" design note (§9).

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub check_id: u32,
    pub result_tag: String,
    pub event: Value,
}

#[derive(Debug, Default)]
pub struct IntegrityStore {
    records: Vec<StoredRecord>,
    index: HashMap<u32, usize>,
    /// Policy file hash observed as of the previous scan; `None` before the
    /// first scan of this policy.
    pub file_hash: Option<String>,
}

impl IntegrityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored record (§4.4.5: called when the policy file hash
    /// differs from the one observed after the previous scan).
    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    pub fn lookup_tag(&self, check_id: u32) -> Option<&str> {
        self.index.get(&check_id).map(|&i| self.records[i].result_tag.as_str())
    }

    /// Insert or overwrite the record at `position` (the check's 0-based
    /// scan-order index). Positions are expected to be filled in order,
    /// 0, 1, 2, ..., once per scan.
    pub fn upsert(&mut self, position: usize, check_id: u32, result_tag: String, event: Value) {
        let record = StoredRecord { check_id, result_tag, event };
        if position < self.records.len() {
            self.records[position] = record;
        } else {
            self.records.push(record);
        }
        self.index.insert(check_id, position);
    }

    /// Truncate trailing stale records left over from a previous, longer
    /// scan of this policy (e.g. checks removed from the policy file).
    pub fn truncate(&mut self, len: usize) {
        if len < self.records.len() {
            for stale in &self.records[len..] {
                self.index.remove(&stale.check_id);
            }
            self.records.truncate(len);
        }
    }

    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    /// SHA-256 over the `:`-joined, scan-order result tags (§4.4.3).
    pub fn integrity_hash(&self) -> String {
        let joined = self
            .records
            .iter()
            .map(|r| r.result_tag.as_str())
            .collect::<Vec<_>>()
            .join(":");
        hex_sha256(joined.as_bytes())
    }
}

pub fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// SHA-256 of the policy file bytes (§4.4.4).
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex_sha256(&bytes))
}
