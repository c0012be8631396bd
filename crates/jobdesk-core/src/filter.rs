use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::trace;

use crate::job::{
  Job,
  Status
};
use crate::taxonomy::Taxonomy;

pub const TOTAL_KEY: &str = "Total";
pub const OVERDUE_KEY: &str = "Overdue";
pub const IN_PROGRESS_KEY: &str =
  "In Progress";

/// Drill-down selector picked from a
/// dashboard card or category bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrillKey {
  Total,
  Overdue,
  /// Groups `In Progress` and
  /// `Pending` under one label.
  InProgress,
  Category(String),
  Status(String)
}

impl DrillKey {
  pub fn resolve(
    raw: &str,
    taxonomy: &Taxonomy
  ) -> Self {
    match raw {
      | TOTAL_KEY => DrillKey::Total,
      | OVERDUE_KEY => DrillKey::Overdue,
      | IN_PROGRESS_KEY => {
        DrillKey::InProgress
      }
      | other
        if taxonomy.contains(other) =>
      {
        DrillKey::Category(
          other.to_string()
        )
      }
      | other => {
        DrillKey::Status(
          other.to_string()
        )
      }
    }
  }

  pub fn title(&self) -> String {
    match self {
      | DrillKey::Total => {
        TOTAL_KEY.to_string()
      }
      | DrillKey::Overdue => {
        OVERDUE_KEY.to_string()
      }
      | DrillKey::InProgress => {
        "In Progress & Pending"
          .to_string()
      }
      | DrillKey::Category(name) => {
        format!("Category: {name}")
      }
      | DrillKey::Status(status) => {
        status.clone()
      }
    }
  }

  fn matches(
    &self,
    job: &Job,
    today: NaiveDate
  ) -> bool {
    match self {
      | DrillKey::Total => true,
      | DrillKey::Overdue => {
        job.is_overdue(today)
      }
      | DrillKey::InProgress => {
        matches!(
          job.status,
          Status::InProgress
            | Status::Pending
        )
      }
      | DrillKey::Category(name) => {
        job.category == *name
      }
      | DrillKey::Status(status) => {
        job.status.as_str() == status
      }
    }
  }
}

/// Drill-down filter plus optional
/// case-insensitive search. Output
/// keeps collection order.
#[derive(Debug, Clone)]
pub struct Filter {
  key:    DrillKey,
  search: Option<String>
}

impl Filter {
  pub fn new(
    key: DrillKey,
    search: Option<&str>
  ) -> Self {
    Self {
      key,
      search: normalize_search(search)
    }
  }

  /// First term is the drill key, the
  /// rest form the search text.
  #[tracing::instrument(skip(
    terms, taxonomy
  ))]
  pub fn parse(
    terms: &[String],
    taxonomy: &Taxonomy
  ) -> anyhow::Result<Self> {
    let Some((key, rest)) =
      terms.split_first()
    else {
      return Err(anyhow!(
        "drill: a filter key is \
         required (Total, Overdue, \
         In Progress, a category or a \
         status)"
      ));
    };

    let search = rest.join(" ");
    Ok(Self::new(
      DrillKey::resolve(key, taxonomy),
      Some(search.as_str())
    ))
  }

  pub fn key(&self) -> &DrillKey {
    &self.key
  }

  pub fn matches(
    &self,
    job: &Job,
    today: NaiveDate
  ) -> bool {
    if !self.key.matches(job, today) {
      return false;
    }

    match &self.search {
      | Some(term) => {
        let hit = search_hit(
          term,
          &[
            &job.branch_dept,
            &job.job_type,
            &job.category,
            &job.keterangan
          ]
        );
        trace!(id = %job.id, hit, "drill search");
        hit
      }
      | None => true
    }
  }

  pub fn apply<'a>(
    &self,
    jobs: &'a [Job],
    today: NaiveDate
  ) -> Vec<&'a Job> {
    jobs
      .iter()
      .filter(|job| {
        self.matches(job, today)
      })
      .collect()
  }
}

/// Category Job List view: one menu
/// bucket, searched over branch, job
/// type and notes (not category).
pub fn scoped_view<'a>(
  jobs: &'a [Job],
  category: &str,
  sub_category: &str,
  search: Option<&str>
) -> Vec<&'a Job> {
  let term = normalize_search(search);
  jobs
    .iter()
    .filter(|job| {
      job.category == category
        && job.sub_category
          == sub_category
    })
    .filter(|job| {
      term.as_deref().is_none_or(
        |term| {
          search_hit(
            term,
            &[
              &job.branch_dept,
              &job.job_type,
              &job.keterangan
            ]
          )
        }
      )
    })
    .collect()
}

fn normalize_search(
  search: Option<&str>
) -> Option<String> {
  search
    .filter(|s| !s.is_empty())
    .map(str::to_lowercase)
}

fn search_hit(
  term: &str,
  fields: &[&String]
) -> bool {
  fields.iter().any(|field| {
    field.to_lowercase().contains(term)
  })
}
