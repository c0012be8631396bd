use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tempfile::NamedTempFile;
use tracing::info;

use crate::datetime::{add_days, format_iso_date};
use crate::import::ImportLayout;
use crate::taxonomy::uses_activation_date;

const SCOPED_HEADER: &str = concat!(
    "Tanggal Input (YYYY-MM-DD),Cabang/Dept,Jenis Pekerjaan,Status,",
    "Deadline (YYYY-MM-DD),Keterangan"
);
const ACTIVATION_HEADER: &str = "Tanggal Aktifasi (YYYY-MM-DD)";
const GLOBAL_HEADER: &str = concat!(
    "Kategori,Sub Kategori,Tanggal Input (YYYY-MM-DD),Cabang/Dept,Jenis Pekerjaan,Status,",
    "Dateline (YYYY-MM-DD),Keterangan"
);
const GLOBAL_FILE_NAME: &str = "Template_Global_Upload.csv";
const EXAMPLE_LEAD_DAYS: u64 = 7;

/// A downloadable CSV whose columns match what the importer expects for the
/// same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub file_name: String,
    pub contents: String,
}

impl Template {
    #[tracing::instrument(skip(self), fields(file = %self.file_name))]
    pub fn write_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(&self.file_name);

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(self.contents.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

        info!(path = %path.display(), "wrote template");
        Ok(path)
    }
}

pub fn template_for(layout: &ImportLayout, today: NaiveDate) -> Template {
    let date = format_iso_date(today);
    let deadline = format_iso_date(add_days(today, EXAMPLE_LEAD_DAYS));

    match layout {
        ImportLayout::Scoped {
            category,
            sub_category,
        } => {
            let (header, example) = if uses_activation_date(category) {
                (
                    format!("{SCOPED_HEADER},{ACTIVATION_HEADER}"),
                    [
                        date.as_str(),
                        "Jakarta",
                        "Input Master Vendor",
                        "Pending",
                        deadline.as_str(),
                        "Notes optional",
                        date.as_str(),
                    ]
                    .join(","),
                )
            } else {
                (
                    SCOPED_HEADER.to_string(),
                    [
                        date.as_str(),
                        "Bandung",
                        "Update Routing",
                        "In Progress",
                        deadline.as_str(),
                        "Notes optional",
                    ]
                    .join(","),
                )
            };

            Template {
                file_name: format!(
                    "Template_{}_{}.csv",
                    file_safe(category),
                    file_safe(sub_category)
                ),
                contents: format!("{header}\n{example}"),
            }
        }
        ImportLayout::Global => Template {
            file_name: GLOBAL_FILE_NAME.to_string(),
            contents: format!(
                "{GLOBAL_HEADER}\nPenyesuaian,Publish Rate,{date},Jakarta,Update Tarif,Pending,\
                 {deadline},Catatan Tambahan"
            ),
        },
    }
}

// Path separators only; everything else is kept so names stay recognizable.
fn file_safe(name: &str) -> String {
    name.replace(['/', '\\'], "-")
}
