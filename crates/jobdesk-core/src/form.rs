use anyhow::anyhow;
use chrono::NaiveDate;

use crate::datetime::format_iso_date;
use crate::job::{Job, JobPatch, Status, User};
use crate::taxonomy::uses_activation_date;

/// Manual entry form state for one job inside a category/sub-category bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDraft {
    pub date_input: Option<String>,
    pub branch_dept: Option<String>,
    pub job_type: Option<String>,
    pub status: Option<Status>,
    pub deadline: Option<String>,
    pub activation_date: Option<String>,
    pub keterangan: Option<String>,
}

impl JobDraft {
    /// Blank form: today's date, status Pending, empty notes.
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            date_input: Some(format_iso_date(today)),
            status: Some(Status::Pending),
            keterangan: Some(String::new()),
            ..Self::default()
        }
    }

    /// Form pre-filled for editing an existing job.
    pub fn from_job(job: &Job) -> Self {
        Self {
            date_input: Some(job.date_input.clone()),
            branch_dept: Some(job.branch_dept.clone()),
            job_type: Some(job.job_type.clone()),
            status: Some(job.status),
            deadline: Some(job.deadline.clone()),
            activation_date: job.activation_date.clone(),
            keterangan: Some(job.keterangan.clone()),
        }
    }

    pub fn missing_fields(&self, category: &str) -> Vec<&'static str> {
        let blank = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.date_input) {
            missing.push("date");
        }
        if blank(&self.branch_dept) {
            missing.push("branch");
        }
        if blank(&self.job_type) {
            missing.push("type");
        }
        if blank(&self.deadline) {
            missing.push("deadline");
        }
        if uses_activation_date(category) && blank(&self.activation_date) {
            missing.push("activation");
        }
        missing
    }

    pub fn validate(&self, category: &str) -> anyhow::Result<()> {
        let missing = self.missing_fields(category);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("missing required field(s): {}", missing.join(", ")))
        }
    }

    /// Submits a new job into `category`/`sub_category`, attributed to `user`.
    pub fn into_job(self, category: &str, sub_category: &str, user: &User) -> anyhow::Result<Job> {
        self.validate(category)?;

        let mut job = Job::new_pending(
            category.to_string(),
            sub_category.to_string(),
            self.date_input.unwrap_or_default(),
        );
        job.branch_dept = self.branch_dept.unwrap_or_default();
        job.job_type = self.job_type.unwrap_or_default();
        job.status = self.status.unwrap_or(Status::Pending);
        job.deadline = self.deadline.unwrap_or_default();
        job.keterangan = self.keterangan.unwrap_or_default();
        job.created_by = Some(user.email.clone());
        if uses_activation_date(category) {
            job.activation_date = self.activation_date;
        }
        Ok(job)
    }

    /// Submits an edit: every editable field is written back.
    pub fn into_patch(self, category: &str) -> anyhow::Result<JobPatch> {
        self.validate(category)?;

        Ok(JobPatch {
            date_input: self.date_input,
            branch_dept: self.branch_dept,
            job_type: self.job_type,
            status: self.status,
            deadline: self.deadline,
            activation_date: Some(if uses_activation_date(category) {
                self.activation_date
            } else {
                None
            }),
            keterangan: Some(self.keterangan.unwrap_or_default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::PRODUCTION_MASTER_DATA;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).expect("valid date")
    }

    fn filled() -> JobDraft {
        JobDraft {
            branch_dept: Some("Jakarta / Ops".to_string()),
            job_type: Some("Update Tarif".to_string()),
            deadline: Some("2024-03-25".to_string()),
            ..JobDraft::fresh(today())
        }
    }

    #[test]
    fn blank_required_fields_block_submission() {
        let draft = JobDraft {
            branch_dept: Some("   ".to_string()),
            ..JobDraft::fresh(today())
        };
        assert_eq!(draft.missing_fields("Penyesuaian"), vec!["branch", "type", "deadline"]);
        let err = draft
            .into_job("Penyesuaian", "Publish Rate", &User::new("u", "u"))
            .expect_err("blocked");
        assert!(err.to_string().contains("branch, type, deadline"));
    }

    #[test]
    fn production_master_data_requires_activation() {
        assert_eq!(filled().missing_fields(PRODUCTION_MASTER_DATA), vec!["activation"]);
        assert!(filled().missing_fields("Penyesuaian").is_empty());
    }

    #[test]
    fn create_sets_context_and_attribution() {
        let user = User::new("rina@example.com", "Rina");
        let mut draft = filled();
        draft.activation_date = Some("2024-04-01".to_string());

        let job = draft
            .into_job("Penyesuaian", "Publish Rate", &user)
            .expect("valid draft");
        assert_eq!(job.category, "Penyesuaian");
        assert_eq!(job.sub_category, "Publish Rate");
        assert_eq!(job.date_input, "2024-03-20");
        assert_eq!(job.status, Status::Pending);
        assert_eq!(job.keterangan, "");
        assert_eq!(job.activation_date, None);
        assert_eq!(job.created_by.as_deref(), Some("rina@example.com"));
    }

    #[test]
    fn edit_round_trips_and_clears_activation_outside_master_data() {
        let mut job = filled()
            .into_job("Penyesuaian", "Publish Rate", &User::new("u", "u"))
            .expect("valid draft");
        job.activation_date = Some("stale".to_string());

        let mut draft = JobDraft::from_job(&job);
        draft.status = Some(Status::Completed);
        let patch = draft.into_patch("Penyesuaian").expect("valid edit");
        assert_eq!(patch.activation_date, Some(None));

        let created_by = job.created_by.clone();
        job.apply_patch(&patch);
        assert_eq!(job.status, Status::Completed);
        assert_eq!(job.activation_date, None);
        assert_eq!(job.created_by, created_by);
    }
}
