// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sealed snapshot export: a line-delimited JSON chain log of [`SealEntry`]
//! records, each committing to the snapshot file it accompanies and to the
//! previous seal (SPEC_FULL §4.6).
//!
//! Unlike [`crate::payload`], which chains the records *inside* one export,
//! a seal chain links successive *exports* together, so a verifier can
//! confirm that no sealed snapshot has ever been removed from the log.

use chrono::{DateTime, Utc};
use gate_core::canonical::{GENESIS_HASH, hash_bytes, hash_canonical_json};
use gate_error::{ClaweeError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// One entry in a sealed chain-log: a pointer to an exported snapshot file,
/// chained to the previous entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealEntry {
    /// When this seal was recorded.
    pub sealed_at: DateTime<Utc>,
    /// Path to the snapshot file this seal covers, as written to disk.
    pub snapshot_path: String,
    /// `hash_bytes` of the snapshot file's raw contents.
    pub payload_hash: String,
    /// `current_snapshot_hash` of the previous seal, or [`GENESIS_HASH`].
    pub previous_snapshot_hash: String,
    /// `hash_canonical_json` of this seal's other fields.
    pub current_snapshot_hash: String,
    /// `generated_at` of the snapshot payload this seal covers.
    pub generated_at: DateTime<Utc>,
    /// Signature over the snapshot payload, if the payload was signed.
    pub signature: Option<String>,
    /// Key id the signature was produced under, if signed.
    pub signature_kid: Option<String>,
}

/// Why a sealed chain-log failed to verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SealVerifyError {
    /// The chain log has no entries.
    #[error("sealed chain log is empty")]
    Empty,
    /// An entry's `current_snapshot_hash` does not match its recomputed value.
    #[error("hash mismatch at seal index {index}")]
    HashMismatch {
        /// Index of the entry with the mismatched hash.
        index: usize,
    },
    /// An entry's `previous_snapshot_hash` does not match its predecessor.
    #[error("broken link at seal index {index}")]
    BrokenLink {
        /// Index of the entry with the broken link.
        index: usize,
    },
}

/// Writes `payload_bytes` to `snapshot_path` and appends a matching
/// [`SealEntry`] to `chain_log_path`, chained to whatever seal (if any)
/// already terminates that log.
///
/// The snapshot file is written before the chain-log line, so a reader that
/// observes the new log line is guaranteed the snapshot it names already
/// exists on disk.
///
/// # Errors
///
/// Returns [`ClaweeError`] if the snapshot or chain-log file cannot be
/// written, or if an existing chain-log tail cannot be parsed.
#[allow(clippy::too_many_arguments)]
pub fn export_sealed_snapshot(
    payload_bytes: &[u8],
    generated_at: DateTime<Utc>,
    snapshot_path: &Path,
    chain_log_path: &Path,
    signature: Option<&str>,
    signature_kid: Option<&str>,
) -> Result<SealEntry, ClaweeError> {
    fs::write(snapshot_path, payload_bytes)
        .map_err(|e| io_error("failed to write snapshot file", snapshot_path, &e))?;

    let previous_snapshot_hash = last_entry(chain_log_path)?.map_or_else(|| GENESIS_HASH.to_string(), |e| e.current_snapshot_hash);

    let sealed_at = Utc::now();
    let payload_hash = hash_bytes(payload_bytes);
    let snapshot_path_str = snapshot_path.to_string_lossy().into_owned();

    #[derive(Serialize)]
    struct Unhashed<'a> {
        sealed_at: DateTime<Utc>,
        snapshot_path: &'a str,
        payload_hash: &'a str,
        previous_snapshot_hash: &'a str,
        generated_at: DateTime<Utc>,
        signature: Option<&'a str>,
        signature_kid: Option<&'a str>,
    }
    let current_snapshot_hash = hash_canonical_json(&Unhashed {
        sealed_at,
        snapshot_path: &snapshot_path_str,
        payload_hash: &payload_hash,
        previous_snapshot_hash: &previous_snapshot_hash,
        generated_at,
        signature,
        signature_kid,
    })?
    .value;

    let entry = SealEntry {
        sealed_at,
        snapshot_path: snapshot_path_str,
        payload_hash,
        previous_snapshot_hash,
        current_snapshot_hash,
        generated_at,
        signature: signature.map(str::to_string),
        signature_kid: signature_kid.map(str::to_string),
    };

    append_entry(chain_log_path, &entry)?;
    Ok(entry)
}

/// Re-reads `chain_log_path` and verifies every hash and link in it.
///
/// # Errors
///
/// Returns [`ClaweeError`] if `chain_log_path` cannot be read or contains a
/// line that does not parse as a [`SealEntry`]; returns
/// `Ok(Err(SealVerifyError))` for a structurally valid but broken chain.
pub fn verify_sealed_chain(chain_log_path: &Path) -> Result<Result<(), SealVerifyError>, ClaweeError> {
    let entries = read_entries(chain_log_path)?;
    if entries.is_empty() {
        return Ok(Err(SealVerifyError::Empty));
    }

    let mut expected_previous = GENESIS_HASH.to_string();
    for (index, entry) in entries.iter().enumerate() {
        if entry.previous_snapshot_hash != expected_previous {
            return Ok(Err(SealVerifyError::BrokenLink { index }));
        }
        let recomputed = recompute_hash(entry)?;
        if recomputed != entry.current_snapshot_hash {
            return Ok(Err(SealVerifyError::HashMismatch { index }));
        }
        expected_previous = entry.current_snapshot_hash.clone();
    }
    Ok(Ok(()))
}

fn recompute_hash(entry: &SealEntry) -> Result<String, ClaweeError> {
    #[derive(Serialize)]
    struct Unhashed<'a> {
        sealed_at: DateTime<Utc>,
        snapshot_path: &'a str,
        payload_hash: &'a str,
        previous_snapshot_hash: &'a str,
        generated_at: DateTime<Utc>,
        signature: Option<&'a str>,
        signature_kid: Option<&'a str>,
    }
    Ok(hash_canonical_json(&Unhashed {
        sealed_at: entry.sealed_at,
        snapshot_path: &entry.snapshot_path,
        payload_hash: &entry.payload_hash,
        previous_snapshot_hash: &entry.previous_snapshot_hash,
        generated_at: entry.generated_at,
        signature: entry.signature.as_deref(),
        signature_kid: entry.signature_kid.as_deref(),
    })?
    .value)
}

fn last_entry(chain_log_path: &Path) -> Result<Option<SealEntry>, ClaweeError> {
    Ok(read_entries(chain_log_path)?.pop())
}

fn read_entries(chain_log_path: &Path) -> Result<Vec<SealEntry>, ClaweeError> {
    if !chain_log_path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(chain_log_path).map_err(|e| io_error("failed to open chain log", chain_log_path, &e))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| io_error("failed to read chain log line", chain_log_path, &e))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: SealEntry = serde_json::from_str(&line).map_err(|e| {
            ClaweeError::new(ErrorCode::ConfigCatalogUnparseable, "failed to parse chain log line")
                .with_context("path", chain_log_path.to_string_lossy().into_owned())
                .with_context("cause", e.to_string())
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

fn append_entry(chain_log_path: &Path, entry: &SealEntry) -> Result<(), ClaweeError> {
    let line = serde_json::to_string(entry)
        .map_err(|e| ClaweeError::new(ErrorCode::Internal, "failed to serialize seal entry").with_context("cause", e.to_string()))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(chain_log_path)
        .map_err(|e| io_error("failed to open chain log for append", chain_log_path, &e))?;
    writeln!(file, "{line}").map_err(|e| io_error("failed to append seal entry", chain_log_path, &e))?;
    Ok(())
}

fn io_error(message: &str, path: &Path, cause: &std::io::Error) -> ClaweeError {
    ClaweeError::new(ErrorCode::BackendIo, message)
        .with_context("path", path.to_string_lossy().into_owned())
        .with_context("cause", cause.to_string())
}
