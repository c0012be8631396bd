use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::parse_iso_date;

/// Stored job status. `Overdue` is never assigned by the application; it only
/// appears when an import file supplies it verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Overdue,
}

impl Status {
    /// Choices offered on the form and the inline status editor.
    pub const SELECTABLE: [Status; 3] = [Status::Pending, Status::InProgress, Status::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Overdue => "Overdue",
        }
    }

    /// Import-side status mapping: exact match on the three non-default labels,
    /// anything else (including blank or `Pending`) becomes `Pending`.
    pub fn from_import(raw: &str) -> Self {
        match raw.trim() {
            "In Progress" => Status::InProgress,
            "Completed" => Status::Completed,
            "Overdue" => Status::Overdue,
            _ => Status::Pending,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses user input for the form and inline editor. Overdue is derived and
/// cannot be chosen.
impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "pending" => Ok(Status::Pending),
            "in progress" | "inprogress" | "progress" => Ok(Status::InProgress),
            "completed" | "complete" | "done" => Ok(Status::Completed),
            "overdue" => Err(anyhow!(
                "overdue is derived from the deadline and cannot be set"
            )),
            other => {
                let expected: Vec<&str> = Status::SELECTABLE.iter().map(Status::as_str).collect();
                Err(anyhow!(
                    "invalid status: {other} (expected one of: {})",
                    expected.join(", ")
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,

    pub category: String,

    pub sub_category: String,

    pub date_input: String,

    pub branch_dept: String,

    pub job_type: String,

    pub status: Status,

    pub deadline: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_date: Option<String>,

    #[serde(default, alias = "notes")]
    pub keterangan: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Job {
    pub fn new_pending(category: String, sub_category: String, date_input: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            sub_category,
            date_input,
            branch_dept: String::new(),
            job_type: String::new(),
            status: Status::Pending,
            deadline: String::new(),
            activation_date: None,
            keterangan: String::new(),
            created_by: None,
        }
    }

    pub fn deadline_date(&self) -> Option<NaiveDate> {
        parse_iso_date(&self.deadline)
    }

    /// Deadline strictly before `today` and not completed. A deadline that is
    /// not a calendar date never makes a job overdue.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != Status::Completed
            && self.deadline_date().map(|d| d < today).unwrap_or(false)
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    pub fn apply_patch(&mut self, patch: &JobPatch) {
        if let Some(value) = &patch.date_input {
            self.date_input = value.clone();
        }
        if let Some(value) = &patch.branch_dept {
            self.branch_dept = value.clone();
        }
        if let Some(value) = &patch.job_type {
            self.job_type = value.clone();
        }
        if let Some(value) = patch.status {
            self.status = value;
        }
        if let Some(value) = &patch.deadline {
            self.deadline = value.clone();
        }
        if let Some(value) = &patch.activation_date {
            self.activation_date = value.clone();
        }
        if let Some(value) = &patch.keterangan {
            self.keterangan = value.clone();
        }
    }
}

/// Partial update. Identity, taxonomy placement and attribution are not
/// representable here, so they cannot change after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPatch {
    pub date_input: Option<String>,
    pub branch_dept: Option<String>,
    pub job_type: Option<String>,
    pub status: Option<Status>,
    pub deadline: Option<String>,
    pub activation_date: Option<Option<String>>,
    pub keterangan: Option<String>,
}

impl JobPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn deadline(deadline: String) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.date_input.is_some() {
            fields.push("dateInput");
        }
        if self.branch_dept.is_some() {
            fields.push("branchDept");
        }
        if self.job_type.is_some() {
            fields.push("jobType");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.deadline.is_some() {
            fields.push("deadline");
        }
        if self.activation_date.is_some() {
            fields.push("activationDate");
        }
        if self.keterangan.is_some() {
            fields.push("keterangan");
        }
        fields
    }
}

/// The acting user, handed in fully formed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }
}
