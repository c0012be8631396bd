use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::activity::ActivityEntry;
use crate::config::Config;
use crate::job::{Job, Status};
use crate::stats::Summary;
use crate::taxonomy::Taxonomy;

const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const BLUE: &str = "34";
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

/// Which optional columns a job table shows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLayout {
    pub category: bool,
    pub activation: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color").unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, jobs, today))]
    pub fn print_job_table(
        &self,
        jobs: &[&Job],
        today: NaiveDate,
        layout: TableLayout,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_job_table(&mut out, jobs, today, layout)
    }

    pub fn write_job_table<W: Write>(
        &self,
        mut out: W,
        jobs: &[&Job],
        today: NaiveDate,
        layout: TableLayout,
    ) -> anyhow::Result<()> {
        if jobs.is_empty() {
            writeln!(out, "No jobs found.")?;
            return Ok(());
        }

        let mut headers = vec!["ID".to_string()];
        if layout.category {
            headers.push("Category / Sub".to_string());
        }
        headers.extend(["Date", "Branch/Dept", "Job Type", "Notes"].map(String::from));
        if layout.activation {
            headers.push("Activation".to_string());
        }
        headers.extend(["Status", "Deadline", "By"].map(String::from));

        let mut rows = Vec::with_capacity(jobs.len());
        for job in jobs {
            let overdue = job.is_overdue(today);

            let mut row = vec![self.paint(&job.short_id(), YELLOW)];
            if layout.category {
                row.push(format!("{} / {}", job.category, job.sub_category));
            }
            row.push(job.date_input.clone());
            row.push(job.branch_dept.clone());
            row.push(job.job_type.clone());
            row.push(dash_if_empty(&job.keterangan));
            if layout.activation {
                row.push(dash_if_empty(job.activation_date.as_deref().unwrap_or_default()));
            }
            row.push(self.paint(job.status.as_str(), status_color(job.status, overdue)));
            row.push(if overdue {
                self.paint(&job.deadline, RED)
            } else {
                job.deadline.clone()
            });
            row.push(dash_if_empty(job.created_by.as_deref().unwrap_or_default()));
            rows.push(row);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, job))]
    pub fn print_job_info(&self, job: &Job, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", job.id)?;
        writeln!(out, "category    {}", job.category)?;
        writeln!(out, "sub         {}", job.sub_category)?;
        writeln!(out, "date        {}", job.date_input)?;
        writeln!(out, "branch      {}", job.branch_dept)?;
        writeln!(out, "type        {}", job.job_type)?;
        writeln!(out, "status      {}", job.status)?;
        writeln!(out, "deadline    {}", job.deadline)?;
        if job.is_overdue(today) {
            writeln!(out, "            {}", self.paint("overdue", RED))?;
        }
        if let Some(activation) = &job.activation_date {
            writeln!(out, "activation  {activation}")?;
        }
        writeln!(out, "notes       {}", dash_if_empty(&job.keterangan))?;
        writeln!(
            out,
            "created by  {}",
            dash_if_empty(job.created_by.as_deref().unwrap_or_default())
        )?;

        Ok(())
    }

    #[tracing::instrument(skip(self, summary))]
    pub fn print_summary(&self, summary: &Summary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_summary(&mut out, summary)
    }

    pub fn write_summary<W: Write>(&self, mut out: W, summary: &Summary) -> anyhow::Result<()> {
        writeln!(out, "{:<13}{}", "Total", summary.total)?;
        for (slice, color) in summary.status_breakdown().iter().zip([BLUE, YELLOW, GREEN, RED]) {
            writeln!(out, "{:<13}{}", slice.label, self.paint(&slice.value.to_string(), color))?;
        }
        writeln!(out)?;

        let peak = summary
            .by_category
            .iter()
            .map(|c| c.count)
            .max()
            .unwrap_or(0)
            .max(1);
        let label_width = summary
            .by_category
            .iter()
            .map(|c| UnicodeWidthStr::width(c.name.as_str()))
            .max()
            .unwrap_or(0);

        writeln!(out, "Jobs per category")?;
        for entry in &summary.by_category {
            let bar = "#".repeat(entry.count * BAR_WIDTH / peak);
            let padding = label_width.saturating_sub(UnicodeWidthStr::width(entry.name.as_str()));
            writeln!(
                out,
                "  {}{} {:>4} {}",
                entry.name,
                " ".repeat(padding),
                entry.count,
                bar
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, taxonomy))]
    pub fn print_taxonomy(&self, taxonomy: &Taxonomy) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for category in taxonomy.categories() {
            writeln!(out, "{}", category.name)?;
            for sub in &category.sub_categories {
                writeln!(out, "  {sub}")?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, entries))]
    pub fn print_activity(&self, entries: &[ActivityEntry]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = ["Time", "User", "Action", "Category", "Description"]
            .map(String::from)
            .to_vec();
        let rows = entries
            .iter()
            .map(|entry| {
                vec![
                    entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                    entry.user.clone(),
                    entry.action.as_str().to_string(),
                    entry.category.clone().unwrap_or_default(),
                    entry.description.clone(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn status_color(status: Status, overdue: bool) -> &'static str {
    if overdue {
        return RED;
    }
    match status {
        Status::Completed => GREEN,
        Status::InProgress => YELLOW,
        Status::Pending | Status::Overdue => BLUE,
    }
}

fn dash_if_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
