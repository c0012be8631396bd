use chrono::NaiveDate;
use serde::Serialize;

use crate::job::{Job, Status};
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSlice {
    pub label: &'static str,
    pub value: usize,
}

/// Dashboard aggregates. A pure function of the collection and today's date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub overdue: usize,
    pub by_category: Vec<CategoryCount>,
}

impl Summary {
    /// Slices for the status pie, in display order.
    pub fn status_breakdown(&self) -> [StatusSlice; 4] {
        [
            StatusSlice {
                label: Status::Pending.as_str(),
                value: self.pending,
            },
            StatusSlice {
                label: Status::InProgress.as_str(),
                value: self.in_progress,
            },
            StatusSlice {
                label: Status::Completed.as_str(),
                value: self.completed,
            },
            StatusSlice {
                label: "Overdue",
                value: self.overdue,
            },
        ]
    }

    /// Jobs whose stored status is none of the three regular ones.
    pub fn unclassified(&self) -> usize {
        self.total - (self.pending + self.in_progress + self.completed)
    }
}

#[tracing::instrument(skip(jobs, taxonomy), fields(count = jobs.len()))]
pub fn summarize(jobs: &[Job], taxonomy: &Taxonomy, today: NaiveDate) -> Summary {
    let count_status = |status: Status| jobs.iter().filter(|j| j.status == status).count();

    Summary {
        total: jobs.len(),
        completed: count_status(Status::Completed),
        pending: count_status(Status::Pending),
        in_progress: count_status(Status::InProgress),
        overdue: jobs.iter().filter(|j| j.is_overdue(today)).count(),
        by_category: category_counts(jobs, taxonomy),
    }
}

/// Every taxonomy category first (zero when absent), then categories only seen
/// in the data, in order of first appearance.
pub fn category_counts(jobs: &[Job], taxonomy: &Taxonomy) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = taxonomy
        .names()
        .map(|name| CategoryCount {
            name: name.to_string(),
            count: 0,
        })
        .collect();

    for job in jobs {
        match counts.iter_mut().find(|c| c.name == job.category) {
            Some(entry) => entry.count += 1,
            None => counts.push(CategoryCount {
                name: job.category.clone(),
                count: 1,
            }),
        }
    }

    counts
}

pub fn overdue_jobs(jobs: &[Job], today: NaiveDate) -> Vec<&Job> {
    jobs.iter().filter(|j| j.is_overdue(today)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::PRODUCTION_MASTER_DATA;

    fn job(category: &str, status: Status, deadline: &str) -> Job {
        let mut job = Job::new_pending(
            category.to_string(),
            "Any".to_string(),
            "2024-03-01".to_string(),
        );
        job.status = status;
        job.deadline = deadline.to_string();
        job
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 25).expect("valid date")
    }

    #[test]
    fn counts_by_status_and_overdue() {
        let jobs = vec![
            job("Penyesuaian", Status::Pending, "2024-03-20"),
            job("Penyesuaian", Status::InProgress, "2024-03-30"),
            job("Validasi", Status::Completed, "2024-03-01"),
            job(PRODUCTION_MASTER_DATA, Status::InProgress, "2024-03-24"),
        ];

        let summary = summarize(&jobs, &Taxonomy::builtin(), today());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.overdue, 2);
        assert_eq!(summary.unclassified(), 0);
        assert_eq!(
            summary.status_breakdown().map(|s| s.value),
            [1, 2, 1, 2]
        );
    }

    #[test]
    fn imported_overdue_status_is_unclassified() {
        let jobs = vec![
            job("Penyesuaian", Status::Overdue, "2030-01-01"),
            job("Penyesuaian", Status::Pending, "2030-01-01"),
        ];
        let summary = summarize(&jobs, &Taxonomy::builtin(), today());
        assert!(summary.pending + summary.in_progress + summary.completed < summary.total);
        assert_eq!(summary.unclassified(), 1);
        assert_eq!(summary.overdue, 0);
    }

    #[test]
    fn every_taxonomy_category_has_a_bucket() {
        let taxonomy = Taxonomy::builtin();
        let summary = summarize(&[], &taxonomy, today());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.by_category.len(), taxonomy.categories().len());
        assert!(summary.by_category.iter().all(|c| c.count == 0));
    }

    #[test]
    fn unknown_categories_are_appended_in_first_seen_order() {
        let taxonomy = Taxonomy::builtin();
        let jobs = vec![
            job("Zulu", Status::Pending, ""),
            job("Penyesuaian", Status::Pending, ""),
            job("Alpha", Status::Pending, ""),
            job("Zulu", Status::Pending, ""),
        ];
        let counts = category_counts(&jobs, &taxonomy);
        let known = taxonomy.categories().len();
        assert_eq!(counts.len(), known + 2);
        assert_eq!(counts[0].name, "Penyesuaian");
        assert_eq!(counts[0].count, 1);
        assert_eq!(counts[known].name, "Zulu");
        assert_eq!(counts[known].count, 2);
        assert_eq!(counts[known + 1].name, "Alpha");
    }

    #[test]
    fn overdue_list_matches_count() {
        let jobs = vec![
            job("Penyesuaian", Status::Pending, "2024-03-24"),
            job("Validasi", Status::Completed, "2024-03-24"),
        ];
        let overdue = overdue_jobs(&jobs, today());
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, jobs[0].id);
    }
}
