use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::datetime::format_iso_date;
use crate::job::{Job, Status, User};
use crate::store::JobStore;
use crate::taxonomy::uses_activation_date;

pub const SCOPED_MIN_COLUMNS: usize = 5;
pub const GLOBAL_MIN_COLUMNS: usize = 7;

pub const DEFAULT_BRANCH: &str = "Unknown";
pub const DEFAULT_JOB_TYPE: &str = "Imported Job";

/// Column layout of an uploaded file.
///
/// Scoped: `date, branch, jobType, status, deadline, keterangan, activationDate?`
/// with the category fixed by the caller.
/// Global: `category, subCategory, date, branch, jobType, status, deadline, keterangan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportLayout {
    Scoped {
        category: String,
        sub_category: String,
    },
    Global,
}

impl ImportLayout {
    pub fn scoped(category: impl Into<String>, sub_category: impl Into<String>) -> Self {
        ImportLayout::Scoped {
            category: category.into(),
            sub_category: sub_category.into(),
        }
    }

    pub fn min_columns(&self) -> usize {
        match self {
            ImportLayout::Scoped { .. } => SCOPED_MIN_COLUMNS,
            ImportLayout::Global => GLOBAL_MIN_COLUMNS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { count: usize },
    NoValidRows,
}

/// Lines split on `\r\n` or `\n`.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Columns split on `,` or `;`. There is no quoting, so a field holding either
/// delimiter is split as well.
pub fn split_columns(line: &str) -> Vec<&str> {
    line.split([',', ';']).collect()
}

/// Parses an uploaded file into fresh jobs. The header line is discarded and
/// malformed lines are dropped silently.
#[tracing::instrument(skip(text, created_by, today), fields(bytes = text.len()))]
pub fn parse_jobs(
    text: &str,
    layout: &ImportLayout,
    created_by: &str,
    today: NaiveDate,
) -> Vec<Job> {
    let today = format_iso_date(today);
    let mut jobs = Vec::new();
    let mut dropped = 0_usize;

    for line in split_lines(text).skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let cols = split_columns(line);
        match parse_row(&cols, layout, created_by, &today) {
            Some(job) => jobs.push(job),
            None => dropped += 1,
        }
    }

    debug!(accepted = jobs.len(), dropped, "parsed import rows");
    jobs
}

fn parse_row(
    cols: &[&str],
    layout: &ImportLayout,
    created_by: &str,
    today: &str,
) -> Option<Job> {
    if cols.len() < layout.min_columns() {
        return None;
    }

    let field = |idx: usize| {
        cols.get(idx)
            .map(|raw| raw.trim())
            .filter(|value| !value.is_empty())
    };
    let or_default = |idx: usize, fallback: &str| field(idx).unwrap_or(fallback).to_string();

    match layout {
        ImportLayout::Scoped {
            category,
            sub_category,
        } => {
            if cols[0].is_empty() {
                return None;
            }

            let mut job = Job::new_pending(
                category.clone(),
                sub_category.clone(),
                or_default(0, today),
            );
            job.branch_dept = or_default(1, DEFAULT_BRANCH);
            job.job_type = or_default(2, DEFAULT_JOB_TYPE);
            job.status = Status::from_import(field(3).unwrap_or_default());
            job.deadline = or_default(4, today);
            job.keterangan = or_default(5, "");
            if uses_activation_date(category) {
                job.activation_date = field(6).map(ToString::to_string);
            }
            job.created_by = Some(created_by.to_string());
            Some(job)
        }
        ImportLayout::Global => {
            if cols[0].is_empty() || cols[1].is_empty() {
                return None;
            }

            let mut job = Job::new_pending(
                cols[0].trim().to_string(),
                cols[1].trim().to_string(),
                or_default(2, today),
            );
            job.branch_dept = or_default(3, DEFAULT_BRANCH);
            job.job_type = or_default(4, DEFAULT_JOB_TYPE);
            job.status = Status::from_import(field(5).unwrap_or_default());
            job.deadline = or_default(6, today);
            job.keterangan = or_default(7, "");
            job.created_by = Some(created_by.to_string());
            Some(job)
        }
    }
}

/// Text content of an upload. Bytes that are not UTF-8 are treated as an empty
/// file, which then imports nothing.
pub fn decode_upload(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        Err(err) => {
            warn!(error = %err, "upload is not valid UTF-8; treating as empty");
            String::new()
        }
    }
}

/// Reads the whole file before anything is parsed.
#[tracing::instrument]
pub fn read_upload(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(decode_upload(&bytes))
}

/// Parses `text` and hands every accepted row to the store in a single
/// `bulk_add_jobs` call.
#[tracing::instrument(skip(store, text, user, today), fields(user = %user.email))]
pub fn import_into<S: JobStore + ?Sized>(
    store: &mut S,
    text: &str,
    layout: &ImportLayout,
    user: &User,
    today: NaiveDate,
) -> anyhow::Result<ImportOutcome> {
    let jobs = parse_jobs(text, layout, &user.email, today);
    if jobs.is_empty() {
        info!("import produced no valid rows");
        return Ok(ImportOutcome::NoValidRows);
    }

    let count = jobs.len();
    store.bulk_add_jobs(jobs)?;
    info!(count, "imported jobs");
    Ok(ImportOutcome::Imported { count })
}
