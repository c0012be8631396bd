use anyhow::anyhow;
use tracing::debug;
use uuid::Uuid;

use crate::job::{Job, JobPatch};

/// Mutation capabilities of whatever owns the canonical job collection.
///
/// Callers never read the collection back after writing; each call is a single
/// logical operation and `bulk_add_jobs` is one unit for undo purposes.
pub trait JobStore {
    fn jobs(&self) -> anyhow::Result<Vec<Job>>;

    fn add_job(&mut self, job: Job) -> anyhow::Result<()>;

    fn update_job(&mut self, id: Uuid, patch: &JobPatch) -> anyhow::Result<()>;

    fn delete_job(&mut self, id: Uuid) -> anyhow::Result<()>;

    fn bulk_add_jobs(&mut self, jobs: Vec<Job>) -> anyhow::Result<()>;
}

/// In-memory collection, used as a test double and for dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    jobs: Vec<Job>,
    bulk_batches: Vec<usize>,
}

impl MemoryStore {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            jobs,
            bulk_batches: Vec::new(),
        }
    }

    pub fn as_slice(&self) -> &[Job] {
        &self.jobs
    }

    /// Size of every `bulk_add_jobs` call, in call order.
    pub fn bulk_batches(&self) -> &[usize] {
        &self.bulk_batches
    }
}

impl JobStore for MemoryStore {
    fn jobs(&self) -> anyhow::Result<Vec<Job>> {
        Ok(self.jobs.clone())
    }

    fn add_job(&mut self, job: Job) -> anyhow::Result<()> {
        ensure_unique(&self.jobs, std::slice::from_ref(&job))?;
        self.jobs.push(job);
        Ok(())
    }

    fn update_job(&mut self, id: Uuid, patch: &JobPatch) -> anyhow::Result<()> {
        apply_update(&mut self.jobs, id, patch)
    }

    fn delete_job(&mut self, id: Uuid) -> anyhow::Result<()> {
        apply_delete(&mut self.jobs, id).map(|_| ())
    }

    fn bulk_add_jobs(&mut self, jobs: Vec<Job>) -> anyhow::Result<()> {
        ensure_unique(&self.jobs, &jobs)?;
        self.bulk_batches.push(jobs.len());
        self.jobs.extend(jobs);
        Ok(())
    }
}

pub(crate) fn ensure_unique(existing: &[Job], incoming: &[Job]) -> anyhow::Result<()> {
    for (idx, job) in incoming.iter().enumerate() {
        let clash = existing.iter().any(|j| j.id == job.id)
            || incoming[..idx].iter().any(|j| j.id == job.id);
        if clash {
            return Err(anyhow!("duplicate job id: {}", job.id));
        }
    }
    Ok(())
}

pub(crate) fn apply_update(jobs: &mut [Job], id: Uuid, patch: &JobPatch) -> anyhow::Result<()> {
    let job = jobs
        .iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(|| anyhow!("job not found: {id}"))?;
    job.apply_patch(patch);
    debug!(%id, fields = ?patch.changed_fields(), "job updated");
    Ok(())
}

pub(crate) fn apply_delete(jobs: &mut Vec<Job>, id: Uuid) -> anyhow::Result<Job> {
    let idx = jobs
        .iter()
        .position(|j| j.id == id)
        .ok_or_else(|| anyhow!("job not found: {id}"))?;
    Ok(jobs.remove(idx))
}

/// Resolves a full UUID or a unique prefix of its simple form.
pub fn resolve_id(jobs: &[Job], token: &str) -> anyhow::Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(token) {
        return Ok(uuid);
    }

    let needle = token.trim().to_ascii_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(anyhow!("job id is required"));
    }

    let mut hits = jobs
        .iter()
        .filter(|j| j.id.simple().to_string().starts_with(&needle));
    let first = hits
        .next()
        .ok_or_else(|| anyhow!("no job matches id {token}"))?;
    if hits.next().is_some() {
        return Err(anyhow!("job id {token} is ambiguous; use more characters"));
    }
    Ok(first.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Status;

    fn job(branch: &str) -> Job {
        let mut job = Job::new_pending(
            "Penyesuaian".to_string(),
            "Publish Rate".to_string(),
            "2024-03-20".to_string(),
        );
        job.branch_dept = branch.to_string();
        job
    }

    #[test]
    fn update_and_delete_unknown_ids_fail_without_changes() {
        let mut store = MemoryStore::new(vec![job("Jakarta")]);
        let missing = Uuid::new_v4();

        assert!(store
            .update_job(missing, &JobPatch::status(Status::Completed))
            .is_err());
        assert!(store.delete_job(missing).is_err());
        assert_eq!(store.as_slice().len(), 1);
        assert_eq!(store.as_slice()[0].status, Status::Pending);
    }

    #[test]
    fn bulk_add_is_one_batch_and_rejects_duplicates() {
        let mut store = MemoryStore::default();
        let first = job("Jakarta");
        let second = job("Bandung");
        store
            .bulk_add_jobs(vec![first.clone(), second])
            .expect("bulk add");
        assert_eq!(store.bulk_batches(), &[2]);

        assert!(store.add_job(first).is_err());
        assert_eq!(store.as_slice().len(), 2);
    }

    #[test]
    fn resolves_unique_prefixes() {
        let jobs = vec![job("Jakarta"), job("Bandung")];
        let full = jobs[0].id.to_string();
        assert_eq!(resolve_id(&jobs, &full).expect("full id"), jobs[0].id);

        let prefix = jobs[1].id.simple().to_string()[..12].to_string();
        assert_eq!(resolve_id(&jobs, &prefix).expect("prefix"), jobs[1].id);

        assert!(resolve_id(&jobs, "").is_err());
        assert!(resolve_id(&jobs, "zzzz").is_err());
    }
}
