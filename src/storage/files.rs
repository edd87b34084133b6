//! File tree storage implementation
//!
//! Layout:
//!
//! ```text
//! data_dir/volume_{v}/section_{s}/page_{p}.json   raw payloads
//! state_dir/progress.json                          {volume, section, page}
//! state_dir/run.json                               latest run record
//! state_dir/gaps.jsonl                             one gap per line
//! ```
//!
//! Every whole-file write goes through a temp file, a rename and a sync of
//! the parent directory, so a crash never leaves a half-written checkpoint or
//! page behind and a completed checkpoint is never rolled back.

use crate::state::{Coordinate, RunStatus};
use crate::storage::traits::{PageStore, ProgressStore, StorageError, StorageResult};
use crate::storage::{GapRecord, RunRecord};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const PROGRESS_FILE: &str = "progress.json";
const RUN_FILE: &str = "run.json";
const GAPS_FILE: &str = "gaps.jsonl";

/// File tree storage backend
pub struct FileStorage {
    data_dir: PathBuf,
    state_dir: PathBuf,
}

/// On-disk shape of `run.json`
#[derive(Debug, Serialize, Deserialize)]
struct RunFile {
    started_at: String,
    finished_at: Option<String>,
    config_hash: String,
    status: String,
}

impl FileStorage {
    /// Opens (creating if needed) the page tree and state directory
    pub fn open(data_dir: &Path, state_dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(data_dir)?;
        fs::create_dir_all(state_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            state_dir: state_dir.to_path_buf(),
        })
    }

    /// Path of the payload file for a coordinate
    pub fn page_path(&self, coordinate: Coordinate) -> PathBuf {
        self.data_dir
            .join(format!("volume_{}", coordinate.volume))
            .join(format!("section_{}", coordinate.section))
            .join(format!("page_{}.json", coordinate.page))
    }

    fn progress_path(&self) -> PathBuf {
        self.state_dir.join(PROGRESS_FILE)
    }

    fn run_path(&self) -> PathBuf {
        self.state_dir.join(RUN_FILE)
    }

    fn gaps_path(&self) -> PathBuf {
        self.state_dir.join(GAPS_FILE)
    }

    fn read_run_file(&self) -> StorageResult<Option<RunFile>> {
        let path = self.run_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let run = serde_json::from_str(&content).map_err(|e| corrupt(&path, e))?;
        Ok(Some(run))
    }
}

/// Writes `bytes` to `path` via a sibling temp file and rename
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_parent_dir(path)?;
    Ok(())
}

/// Flushes the directory entry so the rename itself survives a crash
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            File::open(parent)?.sync_all()?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> StorageResult<()> {
    Ok(())
}

fn corrupt(path: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt {
        location: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Parses `{prefix}{n}{suffix}` into n
fn numbered(name: &str, prefix: &str, suffix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?
        .strip_suffix(suffix)?
        .parse()
        .ok()
        .filter(|n| *n >= 1)
}

/// Lists `(n, path)` for every entry of `dir` named `{prefix}{n}{suffix}`
fn numbered_entries(dir: &Path, prefix: &str, suffix: &str) -> StorageResult<Vec<(u32, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(n) = name.to_str().and_then(|n| numbered(n, prefix, suffix)) {
            entries.push((n, entry.path()));
        }
    }
    Ok(entries)
}

impl ProgressStore for FileStorage {
    fn load_progress(&self) -> StorageResult<Option<Coordinate>> {
        let path = self.progress_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let coordinate: Coordinate =
            serde_json::from_str(&content).map_err(|e| corrupt(&path, e))?;
        coordinate.validate().map_err(|e| corrupt(&path, e))?;
        Ok(Some(coordinate))
    }

    fn save_progress(&mut self, next: Coordinate) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(&next)?;
        write_atomically(&self.progress_path(), &bytes)
    }

    fn start_run(&mut self, config_hash: &str) -> StorageResult<()> {
        let run = RunFile {
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            config_hash: config_hash.to_string(),
            status: RunStatus::Running.to_db_string().to_string(),
        };
        write_atomically(&self.run_path(), &serde_json::to_vec_pretty(&run)?)
    }

    fn finish_run(&mut self, status: RunStatus) -> StorageResult<()> {
        let Some(mut run) = self.read_run_file()? else {
            tracing::warn!("No run record to finish with status {}", status);
            return Ok(());
        };
        run.finished_at = Some(Utc::now().to_rfc3339());
        run.status = status.to_db_string().to_string();
        write_atomically(&self.run_path(), &serde_json::to_vec_pretty(&run)?)
    }

    fn last_run(&self) -> StorageResult<Option<RunRecord>> {
        let Some(run) = self.read_run_file()? else {
            return Ok(None);
        };
        let status = RunStatus::from_db_string(&run.status).ok_or_else(|| {
            corrupt(&self.run_path(), format!("unknown run status '{}'", run.status))
        })?;
        Ok(Some(RunRecord {
            started_at: run.started_at,
            finished_at: run.finished_at,
            config_hash: run.config_hash,
            status,
        }))
    }

    fn record_gap(&mut self, gap: &GapRecord) -> StorageResult<()> {
        let mut line = serde_json::to_string(gap)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.gaps_path())?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn gaps(&self) -> StorageResult<Vec<GapRecord>> {
        let path = self.gaps_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut gaps = Vec::new();
        for line in BufReader::new(File::open(&path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            gaps.push(serde_json::from_str(&line).map_err(|e| corrupt(&path, e))?);
        }
        Ok(gaps)
    }
}

impl PageStore for FileStorage {
    fn store_page(&mut self, coordinate: Coordinate, payload: &Value) -> StorageResult<()> {
        let path = self.page_path(coordinate);
        write_atomically(&path, &serde_json::to_vec_pretty(payload)?)?;
        tracing::debug!("Saved: {}", path.display());
        Ok(())
    }

    fn load_page(&self, coordinate: Coordinate) -> StorageResult<Option<Value>> {
        let path = self.page_path(coordinate);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let payload = serde_json::from_str(&content).map_err(|e| corrupt(&path, e))?;
        Ok(Some(payload))
    }

    fn list_pages(&self) -> StorageResult<Vec<Coordinate>> {
        let mut pages = Vec::new();

        for (volume, volume_dir) in numbered_entries(&self.data_dir, "volume_", "")? {
            for (section, section_dir) in numbered_entries(&volume_dir, "section_", "")? {
                for (page, _) in numbered_entries(&section_dir, "page_", ".json")? {
                    pages.push(Coordinate {
                        volume,
                        section,
                        page,
                    });
                }
            }
        }

        pages.sort();
        Ok(pages)
    }

    fn contains_page(&self, coordinate: Coordinate) -> StorageResult<bool> {
        Ok(self.page_path(coordinate).exists())
    }
}
