// SPDX-License-Identifier: Apache-2.0

//! Audit log store.
//!
//! One append-only entry per executed or attempted query, persisted as
//! JSONL with a bounded in-memory cache of recent entries.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::gate::types::SecurityCheck;

/// Entries kept in memory for fast reads.
const MEMORY_CACHE_SIZE: usize = 1000;

/// One attempted or executed query. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub request_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub generated_sql: String,
    pub security_check: SecurityCheck,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(
        user_id: impl Into<String>,
        question: impl Into<String>,
        generated_sql: impl Into<String>,
        security_check: SecurityCheck,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            question: question.into(),
            generated_sql: generated_sql.into(),
            security_check,
            execution_time_ms: None,
            row_count: None,
            error: None,
        }
    }
}

/// Summary counters over the cached entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: u64,
    pub denied: u64,
    pub failed: u64,
}

/// Append-only audit store with file persistence.
pub struct AuditStore {
    entries: RwLock<VecDeque<AuditEntry>>,
    log_path: PathBuf,
    max_entries: usize,
}

impl AuditStore {
    pub fn new(data_dir: impl Into<PathBuf>, max_entries: usize) -> Self {
        let log_path = data_dir.into().join("audit.jsonl");

        if let Some(parent) = log_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("failed to create audit log directory: {}", e);
            }
        }

        let store = Self {
            entries: RwLock::new(VecDeque::with_capacity(MEMORY_CACHE_SIZE)),
            log_path,
            max_entries,
        };
        store.load_recent_entries();
        store
    }

    fn load_recent_entries(&self) {
        if !self.log_path.exists() {
            return;
        }

        match File::open(&self.log_path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                let mut entries = self.entries.write().unwrap();
                for line in reader.lines().map_while(Result::ok) {
                    if let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) {
                        if entries.len() >= MEMORY_CACHE_SIZE {
                            entries.pop_front();
                        }
                        entries.push_back(entry);
                    }
                }
                debug!("loaded {} audit entries from file", entries.len());
            }
            Err(e) => warn!("failed to load audit log file: {}", e),
        }
    }

    /// Record one entry; persists to file and updates the memory cache.
    pub fn log(&self, entry: AuditEntry) {
        {
            let mut entries = self.entries.write().unwrap();
            if entries.len() >= MEMORY_CACHE_SIZE {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        if let Err(e) = self.append_to_file(&entry) {
            error!("failed to write audit entry: {}", e);
        }

        self.maybe_rotate();
    }

    fn append_to_file(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    fn maybe_rotate(&self) {
        let line_count = match File::open(&self.log_path) {
            Ok(file) => BufReader::new(file).lines().count(),
            Err(_) => return,
        };
        if line_count <= self.max_entries {
            return;
        }

        let keep = self.max_entries * 3 / 4;
        match self.rotate_file(keep) {
            Ok(removed) => info!("rotated audit log, removed {} old entries", removed),
            Err(e) => error!("failed to rotate audit log: {}", e),
        }
    }

    fn rotate_file(&self, keep_count: usize) -> std::io::Result<usize> {
        let file = File::open(&self.log_path)?;
        let lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();

        let total = lines.len();
        if total <= keep_count {
            return Ok(0);
        }
        let skip = total - keep_count;

        let temp_path = self.log_path.with_extension("jsonl.tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            for line in lines.iter().skip(skip) {
                writeln!(writer, "{}", line)?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.log_path)?;

        Ok(skip)
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Counters over the cached entries.
    pub fn stats(&self) -> AuditStats {
        let entries = self.entries.read().unwrap();
        let mut stats = AuditStats::default();
        for entry in entries.iter() {
            stats.total += 1;
            if !entry.security_check.is_safe {
                stats.denied += 1;
            }
            if entry.error.is_some() {
                stats.failed += 1;
            }
        }
        stats
    }

    /// Drop all entries, memory and file.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
        if let Err(e) = File::create(&self.log_path) {
            error!("failed to clear audit log file: {}", e);
        }
        info!("audit log cleared");
    }
}
