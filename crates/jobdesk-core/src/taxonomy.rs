use anyhow::anyhow;
use tracing::debug;

use crate::config::Config;

/// The one category whose jobs carry an activation date.
pub const PRODUCTION_MASTER_DATA: &str = "Produksi Master Data";

const CONFIG_PREFIX: &str = "taxonomy.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub sub_categories: Vec<String>,
}

/// Fixed category → sub-category menu, read-only for the rest of the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Taxonomy {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn builtin() -> Self {
        let entry = |name: &str, subs: &[&str]| Category {
            name: name.to_string(),
            sub_categories: subs.iter().map(|s| s.to_string()).collect(),
        };

        Self::new(vec![
            entry(
                "Penyesuaian",
                &["Publish Rate", "Special Rate", "Biaya Operasional"],
            ),
            entry(
                PRODUCTION_MASTER_DATA,
                &["Master Vendor", "Master Routing", "Master Tarif"],
            ),
            entry("Validasi", &["Tarif", "Biaya"]),
            entry("Laporan", &["Harian", "Bulanan"]),
        ])
    }

    /// `taxonomy.<Category> = Sub A, Sub B` keys replace the built-in menu
    /// when at least one is present.
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> Self {
        let mut categories: Vec<Category> = cfg
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(CONFIG_PREFIX)?.trim();
                if name.is_empty() {
                    return None;
                }
                let sub_categories = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
                Some(Category {
                    name: name.to_string(),
                    sub_categories,
                })
            })
            .collect();

        if categories.is_empty() {
            debug!("no taxonomy keys configured; using built-in taxonomy");
            return Self::builtin();
        }

        categories.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = categories.len(), "loaded taxonomy from config");
        Self::new(categories)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    pub fn get(&self, category: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == category)
    }

    /// Checks that `category`/`sub_category` name a menu bucket.
    pub fn ensure_bucket(&self, category: &str, sub_category: &str) -> anyhow::Result<()> {
        let entry = self.get(category).ok_or_else(|| {
            anyhow!(
                "unknown category: {category} (known: {})",
                self.names().collect::<Vec<_>>().join(", ")
            )
        })?;

        if entry.sub_categories.iter().any(|s| s == sub_category) {
            Ok(())
        } else {
            Err(anyhow!(
                "unknown sub-category {sub_category} for {category} (known: {})",
                entry.sub_categories.join(", ")
            ))
        }
    }
}

pub fn uses_activation_date(category: &str) -> bool {
    category == PRODUCTION_MASTER_DATA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_includes_production_master_data() {
        let taxonomy = Taxonomy::builtin();
        assert!(taxonomy.contains(PRODUCTION_MASTER_DATA));
        assert!(taxonomy.contains("Penyesuaian"));
        assert!(uses_activation_date(PRODUCTION_MASTER_DATA));
        assert!(!uses_activation_date("Penyesuaian"));
    }

    #[test]
    fn bucket_validation_names_the_problem() {
        let taxonomy = Taxonomy::builtin();
        assert!(taxonomy.ensure_bucket("Penyesuaian", "Publish Rate").is_ok());

        let err = taxonomy
            .ensure_bucket("Penyesuaian", "Nope")
            .expect_err("unknown sub-category");
        assert!(err.to_string().contains("Nope"));

        let err = taxonomy
            .ensure_bucket("Missing", "Publish Rate")
            .expect_err("unknown category");
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn config_keys_replace_builtin_sorted_by_name() {
        let mut cfg = Config::empty();
        cfg.apply_overrides(vec![
            ("rc.taxonomy.Zeta".to_string(), "One, Two".to_string()),
            ("taxonomy.Alpha".to_string(), "Only".to_string()),
            ("color".to_string(), "off".to_string()),
        ]);

        let taxonomy = Taxonomy::from_config(&cfg);
        let names: Vec<&str> = taxonomy.names().collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert_eq!(
            taxonomy.get("Zeta").map(|c| c.sub_categories.clone()),
            Some(vec!["One".to_string(), "Two".to_string()])
        );
        assert!(!taxonomy.contains(PRODUCTION_MASTER_DATA));
    }

    #[test]
    fn empty_config_falls_back_to_builtin() {
        assert_eq!(Taxonomy::from_config(&Config::empty()), Taxonomy::builtin());
    }
}
