use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::{Action, ActivityEntry};
use crate::job::{Job, JobPatch};
use crate::store::{JobStore, apply_delete, apply_update, ensure_unique};

/// File-backed job collection: one JSON object per line, rewritten atomically
/// on every mutation, with an undo stack and an activity log alongside.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub jobs_path: PathBuf,
    pub undo_path: PathBuf,
    pub activity_path: PathBuf,
    pub lock_path: PathBuf,
    actor: String,
}

/// What a committed mutation writes to the activity log.
struct Change {
    action: Action,
    description: String,
    category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UndoEntry {
    jobs: Vec<Job>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let jobs_path = data_dir.join("jobs.data");
        let undo_path = data_dir.join("undo.data");
        let activity_path = data_dir.join("activity.data");
        let lock_path = data_dir.join("jobdesk.lock");

        // Never truncate: another process may be writing these right now.
        for path in [&jobs_path, &undo_path, &activity_path, &lock_path] {
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            jobs = %jobs_path.display(),
            undo = %undo_path.display(),
            activity = %activity_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            jobs_path,
            undo_path,
            activity_path,
            lock_path,
            actor: "unknown".to_string(),
        })
    }

    /// Attributes subsequent activity entries to `actor`.
    pub fn acting_as(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    #[tracing::instrument(skip(self))]
    pub fn load_jobs(&self) -> anyhow::Result<Vec<Job>> {
        load_jsonl(&self.jobs_path).context("failed to load jobs.data")
    }

    #[tracing::instrument(skip(self, jobs))]
    pub fn save_jobs(&self, jobs: &[Job]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.jobs_path, jobs).context("failed to save jobs.data")
    }

    #[tracing::instrument(skip(self, jobs))]
    pub fn push_undo_snapshot(&self, jobs: &[Job]) -> anyhow::Result<()> {
        let mut entries: Vec<UndoEntry> = load_jsonl(&self.undo_path)?;
        entries.push(UndoEntry {
            jobs: jobs.to_vec(),
        });
        save_jsonl_atomic(&self.undo_path, &entries)
    }

    #[tracing::instrument(skip(self))]
    pub fn pop_undo_snapshot(&self) -> anyhow::Result<Option<Vec<Job>>> {
        let mut entries: Vec<UndoEntry> = load_jsonl(&self.undo_path)?;
        let Some(entry) = entries.pop() else {
            return Ok(None);
        };
        save_jsonl_atomic(&self.undo_path, &entries)?;
        Ok(Some(entry.jobs))
    }

    /// Restores the collection as it was before the last mutation. Returns
    /// false when there is nothing to undo.
    #[tracing::instrument(skip(self))]
    pub fn undo(&self) -> anyhow::Result<bool> {
        let _lock = self.lock()?;
        let Some(jobs) = self.pop_undo_snapshot()? else {
            return Ok(false);
        };
        self.save_jobs(&jobs)?;
        info!(count = jobs.len(), "restored previous collection");
        Ok(true)
    }

    #[tracing::instrument(skip(self, description))]
    pub fn record(
        &self,
        action: Action,
        description: String,
        category: Option<String>,
    ) -> anyhow::Result<()> {
        let entry = ActivityEntry::new(&self.actor, action, description, category, Utc::now());
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.activity_path)
            .with_context(|| format!("failed to open {}", self.activity_path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }

    /// Most recent `limit` entries, oldest first.
    #[tracing::instrument(skip(self))]
    pub fn load_activity(&self, limit: usize) -> anyhow::Result<Vec<ActivityEntry>> {
        let entries: Vec<ActivityEntry> =
            load_jsonl(&self.activity_path).context("failed to load activity.data")?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }

    /// Exclusive lock on the data directory, released when the returned file
    /// is dropped. Every read-modify-write of the collection holds it, so
    /// concurrent processes queue instead of overwriting each other.
    fn lock(&self) -> anyhow::Result<fs::File> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .with_context(|| format!("failed to open {}", self.lock_path.display()))?;
        file.lock()
            .with_context(|| format!("failed to lock {}", self.lock_path.display()))?;
        debug!(lock = %self.lock_path.display(), "acquired datastore lock");
        Ok(file)
    }

    /// Loads, edits, snapshots and saves the collection under the lock.
    /// `edit` returns `None` when there is nothing to write. The activity
    /// entry is best-effort: once the collection is saved the change stands.
    fn transact<F>(&self, edit: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Vec<Job>) -> anyhow::Result<Option<Change>>,
    {
        let _lock = self.lock()?;

        let before = self.load_jobs()?;
        let mut after = before.clone();
        let Some(change) = edit(&mut after)? else {
            debug!("no change; nothing written");
            return Ok(());
        };

        self.push_undo_snapshot(&before)?;
        self.save_jobs(&after)?;

        if let Err(err) = self.record(change.action, change.description, change.category) {
            warn!(
                error = %format!("{err:#}"),
                action = change.action.as_str(),
                "change saved but activity entry was not written"
            );
        }
        Ok(())
    }
}

impl JobStore for DataStore {
    fn jobs(&self) -> anyhow::Result<Vec<Job>> {
        self.load_jobs()
    }

    #[tracing::instrument(skip(self, job), fields(id = %job.id))]
    fn add_job(&mut self, job: Job) -> anyhow::Result<()> {
        self.transact(|jobs| {
            ensure_unique(jobs, std::slice::from_ref(&job))?;
            let change = Change {
                action: Action::Create,
                description: format!("created {} / {}", job.job_type, job.branch_dept),
                category: Some(job.category.clone()),
            };
            jobs.push(job);
            Ok(Some(change))
        })
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    fn update_job(&mut self, id: Uuid, patch: &JobPatch) -> anyhow::Result<()> {
        self.transact(|jobs| {
            apply_update(jobs, id, patch)?;
            if patch.is_empty() {
                return Ok(None);
            }
            Ok(Some(Change {
                action: Action::Update,
                description: format!("updated {id}: {}", patch.changed_fields().join(", ")),
                category: jobs.iter().find(|j| j.id == id).map(|j| j.category.clone()),
            }))
        })
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_job(&mut self, id: Uuid) -> anyhow::Result<()> {
        self.transact(|jobs| {
            let removed = apply_delete(jobs, id)?;
            Ok(Some(Change {
                action: Action::Delete,
                description: format!("deleted {} / {}", removed.job_type, removed.branch_dept),
                category: Some(removed.category),
            }))
        })
    }

    #[tracing::instrument(skip(self, incoming), fields(count = incoming.len()))]
    fn bulk_add_jobs(&mut self, incoming: Vec<Job>) -> anyhow::Result<()> {
        if incoming.is_empty() {
            return Ok(());
        }

        self.transact(|jobs| {
            ensure_unique(jobs, &incoming)?;

            let count = incoming.len();
            let mut categories: Vec<String> = Vec::new();
            for job in &incoming {
                if !categories.contains(&job.category) {
                    categories.push(job.category.clone());
                }
            }

            jobs.extend(incoming);
            Ok(Some(Change {
                action: Action::BulkImport,
                description: format!("imported {count} job(s)"),
                category: Some(categories.join(", ")),
            }))
        })
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded jsonl records");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
