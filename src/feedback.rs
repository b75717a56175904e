//! # Feedback Ledger
//! Human corrections of analysis labels, persisted as a JSON array in
//! `<data_dir>/feedbacks.json`, and the score offset derived from them.
//!
//! Writes (save, clear) hold the write lock for the whole
//! read-modify-replace cycle and land through a temp file + rename, so
//! readers only ever see a complete array. The offset is recomputed from the
//! file on every call.
//!
//! Stored entries are converted one at a time. An entry that cannot be read
//! is skipped, and before the next write the original file is copied to
//! `feedbacks.json.corrupt`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::calibrate::round2;
use crate::error::FeedbackError;
use crate::levels::{SentimentLevel, BAND_WIDTH};
use crate::metrics::{FEEDBACK_CLEARED_TOTAL, FEEDBACK_SAVED_TOTAL, FEEDBACK_SCORE_OFFSET};

pub const FEEDBACK_FILE: &str = "feedbacks.json";

/// Score assumed when a submission omits `original_score`.
pub const DEFAULT_ORIGINAL_SCORE: f64 = 50.0;

/// One stored correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub conversation_id: String,
    pub original_label: String,
    pub corrected_label: String,
    pub original_score: f64,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

impl FeedbackRecord {
    /// Both labels as levels, when both are recognized.
    pub fn levels(&self) -> Option<(SentimentLevel, SentimentLevel)> {
        let original = self.original_label.parse().ok()?;
        let corrected = self.corrected_label.parse().ok()?;
        Some((original, corrected))
    }

    /// Lenient conversion of one stored entry. Older files may carry numeric
    /// ids, a null score or missing fields; those fall back to defaults.
    fn from_stored(entry: &Value) -> Result<Self, String> {
        let obj = entry
            .as_object()
            .ok_or_else(|| format!("entry is not an object: {entry}"))?;

        let conversation_id = match obj.get("conversation_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            None | Some(Value::Null) => String::new(),
            Some(other) => return Err(format!("conversation_id has unsupported type: {other}")),
        };
        let text = |field: &str| match obj.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            None | Some(Value::Null) => Ok(String::new()),
            Some(other) => Err(format!("{field} is not a string: {other}")),
        };
        let original_score = match obj.get("original_score") {
            None | Some(Value::Null) => DEFAULT_ORIGINAL_SCORE,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_ORIGINAL_SCORE),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("original_score is not numeric: {s:?}"))?,
            Some(other) => return Err(format!("original_score has unsupported type: {other}")),
        };

        Ok(Self {
            conversation_id,
            original_label: text("original_label")?,
            corrected_label: text("corrected_label")?,
            original_score,
            timestamp: text("timestamp")?,
        })
    }
}

/// Incoming correction as posted by a reviewer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackSubmission {
    /// String or number.
    #[serde(default)]
    pub conversation_id: Option<Value>,
    #[serde(default)]
    pub original_label: Option<String>,
    #[serde(default)]
    pub corrected_label: Option<String>,
    #[serde(default)]
    pub original_score: Option<f64>,
}

impl FeedbackSubmission {
    pub fn new(
        conversation_id: impl Into<String>,
        original_label: impl Into<String>,
        corrected_label: impl Into<String>,
        original_score: f64,
    ) -> Self {
        Self {
            conversation_id: Some(Value::String(conversation_id.into())),
            original_label: Some(original_label.into()),
            corrected_label: Some(corrected_label.into()),
            original_score: Some(original_score),
        }
    }

    /// Check required fields and normalize labels. Nothing is written on error.
    pub fn validate(&self) -> Result<FeedbackRecord, FeedbackError> {
        let conversation_id = match &self.conversation_id {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(FeedbackError::MissingField("conversation_id")),
        };
        let original_label = required_label(&self.original_label, "original_label")?;
        let corrected_label = required_label(&self.corrected_label, "corrected_label")?;

        if original_label == corrected_label {
            return Err(FeedbackError::NoOpCorrection(original_label));
        }

        let original_score = self
            .original_score
            .filter(|s| s.is_finite())
            .unwrap_or(DEFAULT_ORIGINAL_SCORE);

        Ok(FeedbackRecord {
            conversation_id,
            original_label,
            corrected_label,
            original_score,
            timestamp: String::new(),
        })
    }
}

/// Canonical snake_case when the label is known; verbatim otherwise.
fn required_label(raw: &Option<String>, field: &'static str) -> Result<String, FeedbackError> {
    let raw = raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(FeedbackError::MissingField(field))?;
    match raw.parse::<SentimentLevel>() {
        Ok(level) => Ok(level.as_str().to_string()),
        Err(_) => {
            warn!(
                field,
                label = raw,
                closest = %SentimentLevel::closest_to(raw),
                "unknown sentiment label stored verbatim; it will not affect offsets"
            );
            Ok(raw.to_string())
        }
    }
}

/// Global correction derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionOffset {
    /// Score points to add to raw scores.
    pub score_offset: f64,
    /// Mean level shift per original label. Diagnostic only.
    pub label_shifts: BTreeMap<SentimentLevel, f64>,
    /// Records with two recognized labels.
    pub count: usize,
}

impl CorrectionOffset {
    pub fn zero() -> Self {
        Self {
            score_offset: 0.0,
            label_shifts: BTreeMap::new(),
            count: 0,
        }
    }

    /// Refinement applies once any usable correction exists.
    pub fn is_active(&self) -> bool {
        self.count > 0
    }
}

impl Default for CorrectionOffset {
    fn default() -> Self {
        Self::zero()
    }
}

/// `mean(index(corrected) - index(original)) * 100/7` over records with two
/// recognized labels.
pub fn compute_offset(records: &[FeedbackRecord]) -> CorrectionOffset {
    let mut by_label: BTreeMap<SentimentLevel, Vec<i64>> = BTreeMap::new();
    let mut all: Vec<i64> = Vec::new();

    for (original, corrected) in records.iter().filter_map(FeedbackRecord::levels) {
        let shift = corrected.index() as i64 - original.index() as i64;
        by_label.entry(original).or_default().push(shift);
        all.push(shift);
    }

    if all.is_empty() {
        return CorrectionOffset::zero();
    }

    let mean = |v: &[i64]| v.iter().sum::<i64>() as f64 / v.len() as f64;
    let label_shifts = by_label
        .iter()
        .map(|(label, shifts)| (*label, round2(mean(shifts))))
        .collect();

    CorrectionOffset {
        score_offset: round2(mean(&all) * BAND_WIDTH),
        label_shifts,
        count: all.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    /// original label -> corrected label -> count
    pub corrections_by_label: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Count corrections per (original, corrected) pair; empty labels count as
/// `unknown`.
pub fn tally(records: &[FeedbackRecord]) -> FeedbackStats {
    let key = |s: &str| {
        if s.is_empty() {
            "unknown".to_string()
        } else {
            s.to_string()
        }
    };
    let mut corrections_by_label: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for r in records {
        *corrections_by_label
            .entry(key(&r.original_label))
            .or_default()
            .entry(key(&r.corrected_label))
            .or_default() += 1;
    }
    FeedbackStats {
        total: records.len(),
        corrections_by_label,
    }
}

/// Ledger contents as read from disk. `lossy` marks a file that did not
/// parse or had entries that had to be skipped.
#[derive(Debug, Default)]
struct StoredLedger {
    records: Vec<FeedbackRecord>,
    lossy: bool,
}

/// File-backed store of corrections.
#[derive(Debug)]
pub struct FeedbackLedger {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FeedbackLedger {
    /// Ledger at `<data_dir>/feedbacks.json`; creates the directory.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, FeedbackError> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self::in_file(dir.join(FEEDBACK_FILE)))
    }

    /// Ledger at an explicit file path. Nothing is touched until first use.
    pub fn in_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<FeedbackRecord> {
        let _guard = self.lock.read();
        self.load()
    }

    /// Upsert by `conversation_id`: any previous correction for the same
    /// conversation is replaced and the new one appended.
    pub fn save(&self, submission: &FeedbackSubmission) -> Result<FeedbackRecord, FeedbackError> {
        let mut record = submission.validate()?;
        record.timestamp = chrono::Utc::now().to_rfc3339();

        let _guard = self.lock.write();
        let mut records = self.load_for_write()?;
        let before = records.len();
        records.retain(|r| r.conversation_id != record.conversation_id);
        let replaced = records.len() != before;
        records.push(record.clone());
        self.persist(&records)?;

        counter!(FEEDBACK_SAVED_TOTAL).increment(1);
        info!(
            conversation_id = %record.conversation_id,
            original = %record.original_label,
            corrected = %record.corrected_label,
            replaced,
            total = records.len(),
            "feedback saved"
        );
        Ok(record)
    }

    /// Delete every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, FeedbackError> {
        let _guard = self.lock.write();
        let removed = self.load_for_write()?.len();
        self.persist(&[])?;
        counter!(FEEDBACK_CLEARED_TOTAL).increment(1);
        gauge!(FEEDBACK_SCORE_OFFSET).set(0.0);
        info!(removed, "feedback ledger cleared");
        Ok(removed)
    }

    /// Current offset, computed from the latest ledger contents.
    pub fn correction_offsets(&self) -> CorrectionOffset {
        let offset = compute_offset(&self.records());
        gauge!(FEEDBACK_SCORE_OFFSET).set(offset.score_offset);
        offset
    }

    pub fn stats(&self) -> FeedbackStats {
        tally(&self.records())
    }

    /// Readers never fail: missing, unreadable or corrupt files read as empty.
    fn load(&self) -> Vec<FeedbackRecord> {
        match self.read_stored() {
            Ok(stored) => stored.records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "feedback ledger unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Load for a read-modify-replace cycle. Anything the parse could not
    /// keep is copied aside before the file gets rewritten.
    fn load_for_write(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        let stored = self.read_stored()?;
        if stored.lossy {
            let backup = self.corrupt_path();
            fs::copy(&self.path, &backup)?;
            warn!(
                path = %self.path.display(),
                backup = %backup.display(),
                kept = stored.records.len(),
                "feedback ledger had unreadable content, original preserved"
            );
        }
        Ok(stored.records)
    }

    /// Where the pre-rewrite copy of a damaged ledger goes.
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    fn read_stored(&self) -> io::Result<StoredLedger> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoredLedger::default()),
            Err(e) => return Err(e),
        };
        if data.trim().is_empty() {
            return Ok(StoredLedger::default());
        }
        let entries = match serde_json::from_str::<Vec<Value>>(&data) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "feedback ledger corrupt, treating as empty");
                return Ok(StoredLedger {
                    records: Vec::new(),
                    lossy: true,
                });
            }
        };

        let mut stored = StoredLedger {
            records: Vec::with_capacity(entries.len()),
            lossy: false,
        };
        for (index, entry) in entries.iter().enumerate() {
            match FeedbackRecord::from_stored(entry) {
                Ok(record) => stored.records.push(record),
                Err(reason) => {
                    warn!(path = %self.path.display(), index, %reason, "skipping unreadable feedback record");
                    stored.lossy = true;
                }
            }
        }
        Ok(stored)
    }

    fn persist(&self, records: &[FeedbackRecord]) -> Result<(), FeedbackError> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
