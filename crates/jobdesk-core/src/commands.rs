use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{format_iso_date, parse_date_expr, project_today};
use crate::filter::{DrillKey, Filter, IN_PROGRESS_KEY, OVERDUE_KEY, TOTAL_KEY, scoped_view};
use crate::form::JobDraft;
use crate::import::{ImportLayout, ImportOutcome, import_into, read_upload};
use crate::job::{Job, JobPatch, Status, User};
use crate::render::{Renderer, TableLayout};
use crate::stats::summarize;
use crate::store::{JobStore, resolve_id};
use crate::taxonomy::{Taxonomy, uses_activation_date};
use crate::template::template_for;

const DEFAULT_ACTIVITY_LIMIT: usize = 20;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "summary",
        "drill",
        "list",
        "info",
        "add",
        "edit",
        "status",
        "deadline",
        "delete",
        "import",
        "template",
        "categories",
        "activity",
        "export",
        "undo",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, user, inv), fields(user = %user.email))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &Renderer,
    user: &User,
    inv: Invocation,
) -> anyhow::Result<()> {
    let today = project_today(Utc::now());
    let taxonomy = Taxonomy::from_config(cfg);
    let args = inv.command_args.as_slice();

    debug!(
        command = %inv.command,
        args = ?inv.command_args,
        %today,
        "dispatching command"
    );

    match inv.command.as_str() {
        "summary" => cmd_summary(store, renderer, &taxonomy, args, today),
        "drill" => cmd_drill(store, renderer, &taxonomy, args, today),
        "list" => cmd_list(store, renderer, &taxonomy, args, today),
        "info" => cmd_info(store, renderer, args, today),
        "add" => cmd_add(store, &taxonomy, user, args, today),
        "edit" => cmd_edit(store, args, today),
        "status" => cmd_status(store, args),
        "deadline" => cmd_deadline(store, args, today),
        "delete" => cmd_delete(store, args),
        "import" => cmd_import(store, &taxonomy, user, args, today),
        "template" => cmd_template(cfg, &taxonomy, args, today),
        "categories" => renderer.print_taxonomy(&taxonomy),
        "activity" => cmd_activity(store, renderer, args),
        "export" => cmd_export(store),
        "undo" => cmd_undo(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    Category(String),
    SubCategory(String),
    Date(String),
    Branch(String),
    JobType(String),
    Status(Status),
    Deadline(String),
    Activation(String),
    Note(String),
}

/// Splits `key:value` modifiers from free words. Everything after `--` is a
/// free word.
#[instrument(skip(args, today))]
fn split_mods(args: &[String], today: NaiveDate) -> anyhow::Result<(Vec<Mod>, Vec<String>)> {
    let mut mods = Vec::new();
    let mut words = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, today)? {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    Ok((mods, words))
}

fn parse_one_mod(tok: &str, today: NaiveDate) -> anyhow::Result<Option<Mod>> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    let value = value.trim().to_string();
    let date = |raw: &str| -> anyhow::Result<String> {
        Ok(format_iso_date(parse_date_expr(raw, today)?))
    };

    let one_mod = match key.to_ascii_lowercase().as_str() {
        "category" | "cat" => Mod::Category(value),
        "sub" | "subcategory" => Mod::SubCategory(value),
        "date" => Mod::Date(date(&value)?),
        "branch" | "dept" => Mod::Branch(value),
        "type" | "job" => Mod::JobType(value),
        "status" => Mod::Status(value.parse()?),
        "deadline" | "due" => Mod::Deadline(date(&value)?),
        "activation" => Mod::Activation(date(&value)?),
        "note" | "notes" | "keterangan" => Mod::Note(value),
        _ => return Ok(None),
    };
    Ok(Some(one_mod))
}

/// Category/sub-category named by the modifiers, if any.
fn scope_of(mods: &[Mod]) -> (Option<&str>, Option<&str>) {
    let mut category = None;
    let mut sub = None;
    for one_mod in mods {
        match one_mod {
            Mod::Category(value) => category = Some(value.as_str()),
            Mod::SubCategory(value) => sub = Some(value.as_str()),
            _ => {}
        }
    }
    (category, sub)
}

fn required_scope<'a>(
    taxonomy: &Taxonomy,
    mods: &'a [Mod],
    command: &str,
) -> anyhow::Result<(&'a str, &'a str)> {
    match scope_of(mods) {
        (Some(category), Some(sub)) => {
            taxonomy.ensure_bucket(category, sub)?;
            Ok((category, sub))
        }
        _ => Err(anyhow!(
            "{command}: both category:<name> and sub:<name> are required"
        )),
    }
}

/// Scoped when both parts are given, global when neither is.
fn import_layout(taxonomy: &Taxonomy, mods: &[Mod]) -> anyhow::Result<ImportLayout> {
    match scope_of(mods) {
        (None, None) => Ok(ImportLayout::Global),
        _ => {
            let (category, sub) = required_scope(taxonomy, mods, "import/template")?;
            Ok(ImportLayout::scoped(category, sub))
        }
    }
}

fn apply_mods(draft: &mut JobDraft, mods: &[Mod]) -> anyhow::Result<()> {
    for one_mod in mods {
        match one_mod {
            Mod::Category(_) | Mod::SubCategory(_) => {
                return Err(anyhow!(
                    "category and sub-category are fixed once a job is created"
                ));
            }
            Mod::Date(value) => draft.date_input = Some(value.clone()),
            Mod::Branch(value) => draft.branch_dept = Some(value.clone()),
            Mod::JobType(value) => draft.job_type = Some(value.clone()),
            Mod::Status(value) => draft.status = Some(*value),
            Mod::Deadline(value) => draft.deadline = Some(value.clone()),
            Mod::Activation(value) => draft.activation_date = Some(value.clone()),
            Mod::Note(value) => draft.keterangan = Some(value.clone()),
        }
    }
    Ok(())
}

/// Case-insensitive convenience on top of the exact drill keys.
fn canonical_drill_key(raw: &str, taxonomy: &Taxonomy) -> String {
    let folded = raw.trim().to_lowercase().replace(['-', '_'], " ");
    let reserved = [TOTAL_KEY, OVERDUE_KEY, IN_PROGRESS_KEY]
        .into_iter()
        .chain(taxonomy.names())
        .chain([Status::Pending.as_str(), Status::Completed.as_str()]);

    for candidate in reserved {
        if candidate.to_lowercase() == folded {
            return candidate.to_string();
        }
    }
    raw.to_string()
}

fn single_id_arg<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{command}: a job id is required"))
}

fn find_job(jobs: &[Job], token: &str) -> anyhow::Result<Job> {
    let id = resolve_id(jobs, token)?;
    jobs.iter()
        .find(|j| j.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("job not found: {id}"))
}

#[instrument(skip(store, renderer, taxonomy, args, today))]
fn cmd_summary(
    store: &DataStore,
    renderer: &Renderer,
    taxonomy: &Taxonomy,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command summary");

    let jobs = store.jobs()?;
    let summary = summarize(&jobs, taxonomy, today);

    if args.iter().any(|a| a == "json") {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    renderer.print_summary(&summary)?;
    if summary.unclassified() > 0 {
        warn!(
            count = summary.unclassified(),
            "jobs with a stored Overdue status are counted only in the total"
        );
    }
    Ok(())
}

#[instrument(skip(store, renderer, taxonomy, args, today))]
fn cmd_drill(
    store: &DataStore,
    renderer: &Renderer,
    taxonomy: &Taxonomy,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command drill");

    let mut terms = args.to_vec();
    if let Some(first) = terms.first_mut() {
        *first = canonical_drill_key(first, taxonomy);
    }
    let filter = Filter::parse(&terms, taxonomy)?;

    let jobs = store.jobs()?;
    let rows = filter.apply(&jobs, today);
    debug!(key = ?filter.key(), matched = rows.len(), "drill filter applied");

    println!("Job details: {}", filter.key().title());
    renderer.print_job_table(
        &rows,
        today,
        TableLayout {
            category: true,
            activation: matches!(
                filter.key(),
                DrillKey::Category(name) if uses_activation_date(name)
            ),
        },
    )
}

#[instrument(skip(store, renderer, taxonomy, args, today))]
fn cmd_list(
    store: &DataStore,
    renderer: &Renderer,
    taxonomy: &Taxonomy,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");

    let (mods, words) = split_mods(args, today)?;
    let search = words.join(" ");
    let jobs = store.jobs()?;

    if scope_of(&mods) == (None, None) {
        let filter = Filter::new(DrillKey::Total, Some(search.as_str()));
        let rows = filter.apply(&jobs, today);
        return renderer.print_job_table(
            &rows,
            today,
            TableLayout {
                category: true,
                activation: false,
            },
        );
    }

    let (category, sub) = required_scope(taxonomy, &mods, "list")?;
    let rows = scoped_view(&jobs, category, sub, Some(search.as_str()));
    println!("{category} / {sub}");
    renderer.print_job_table(
        &rows,
        today,
        TableLayout {
            category: false,
            activation: uses_activation_date(category),
        },
    )
}

#[instrument(skip(store, renderer, args, today))]
fn cmd_info(
    store: &DataStore,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command info");

    let token = single_id_arg(args, "info")?;
    let job = find_job(&store.jobs()?, token)?;
    renderer.print_job_info(&job, today)
}

#[instrument(skip(store, taxonomy, user, args, today))]
fn cmd_add(
    store: &mut DataStore,
    taxonomy: &Taxonomy,
    user: &User,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command add");

    let (mods, words) = split_mods(args, today)?;
    if !words.is_empty() {
        warn!(?words, "ignoring words that are not key:value modifiers");
    }
    let (category, sub) = required_scope(taxonomy, &mods, "add")?;

    let mut draft = JobDraft::fresh(today);
    let field_mods: Vec<Mod> = mods
        .iter()
        .filter(|m| !matches!(m, Mod::Category(_) | Mod::SubCategory(_)))
        .cloned()
        .collect();
    apply_mods(&mut draft, &field_mods)?;

    let job = draft.into_job(category, sub, user)?;
    let short = job.short_id();
    store.add_job(job)?;

    println!("Created job {short}.");
    Ok(())
}

#[instrument(skip(store, args, today))]
fn cmd_edit(store: &mut DataStore, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command edit");

    let token = single_id_arg(args, "edit")?;
    let job = find_job(&store.jobs()?, token)?;

    let (mods, words) = split_mods(&args[1..], today)?;
    if mods.is_empty() {
        return Err(anyhow!("edit: nothing to change"));
    }
    if !words.is_empty() {
        warn!(?words, "ignoring words that are not key:value modifiers");
    }

    let mut draft = JobDraft::from_job(&job);
    apply_mods(&mut draft, &mods)?;
    let patch = draft.into_patch(&job.category)?;
    store.update_job(job.id, &patch)?;

    println!("Updated job {}.", job.short_id());
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_status(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command status");

    let token = single_id_arg(args, "status")?;
    if args.len() < 2 {
        return Err(anyhow!("status: expected <id> <Pending|In Progress|Completed>"));
    }
    let status: Status = args[1..].join(" ").parse()?;
    let job = find_job(&store.jobs()?, token)?;

    store.update_job(job.id, &JobPatch::status(status))?;
    println!("Job {} is now {status}.", job.short_id());
    Ok(())
}

#[instrument(skip(store, args, today))]
fn cmd_deadline(store: &mut DataStore, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command deadline");

    let token = single_id_arg(args, "deadline")?;
    let raw = args
        .get(1)
        .ok_or_else(|| anyhow!("deadline: expected <id> <date>"))?;
    let deadline = format_iso_date(parse_date_expr(raw, today)?);
    let job = find_job(&store.jobs()?, token)?;

    store.update_job(job.id, &JobPatch::deadline(deadline.clone()))?;
    println!("Job {} is due {deadline}.", job.short_id());
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let token = single_id_arg(args, "delete")?;
    let job = find_job(&store.jobs()?, token)?;
    store.delete_job(job.id)?;

    println!("Deleted job {}.", job.short_id());
    Ok(())
}

#[instrument(skip(store, taxonomy, user, args, today))]
fn cmd_import(
    store: &mut DataStore,
    taxonomy: &Taxonomy,
    user: &User,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command import");

    let (mods, words) = split_mods(args, today)?;
    let [file] = words.as_slice() else {
        return Err(anyhow!("import: expected exactly one file path"));
    };
    let layout = import_layout(taxonomy, &mods)?;

    let text = read_upload(Path::new(file))?;
    match import_into(store, &text, &layout, user, today)? {
        ImportOutcome::Imported { count } => {
            println!("Imported {count} job(s).");
        }
        ImportOutcome::NoValidRows => {
            println!(
                "No valid rows imported. Start from the template and make sure no \
                 required column is blank."
            );
        }
    }
    Ok(())
}

#[instrument(skip(cfg, taxonomy, args, today))]
fn cmd_template(
    cfg: &Config,
    taxonomy: &Taxonomy,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command template");

    let (mods, _) = split_mods(args, today)?;
    let layout = import_layout(taxonomy, &mods)?;
    let dir = cfg
        .get("template.dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let path = template_for(&layout, today).write_to(&dir)?;
    println!("Wrote {}.", path.display());
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_activity(store: &DataStore, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command activity");

    let limit = match args.first() {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| anyhow!("activity: limit must be a number, got {raw}"))?,
        None => DEFAULT_ACTIVITY_LIMIT,
    };
    renderer.print_activity(&store.load_activity(limit)?)
}

#[instrument(skip(store))]
fn cmd_export(store: &DataStore) -> anyhow::Result<()> {
    info!("command export");

    let jobs = store.jobs()?;
    println!("{}", serde_json::to_string(&jobs)?);
    Ok(())
}

#[instrument(skip(store))]
fn cmd_undo(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command undo");

    if store.undo()? {
        println!("Undo completed.");
    } else {
        println!("No undo transactions available.");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
Usage: jobdesk [--user EMAIL] [--data DIR] [--rc KEY=VALUE] <command> [args]

Dashboard
  summary [json]                         counts by status, overdue and category
  drill <key> [search...]                Total, Overdue, \"In Progress\", a category or a status

Category job list
  list [category:C sub:S] [search...]
  info <id>
  add category:C sub:S branch:B type:T deadline:D [date:D] [status:S] [note:N] [activation:D]
  edit <id> [branch:B] [type:T] [status:S] [deadline:D] [date:D] [note:N] [activation:D]
  status <id> <Pending|In Progress|Completed>
  deadline <id> <date>
  delete <id>

Bulk import
  template [category:C sub:S]            write the CSV template (global when no category)
  import <file> [category:C sub:S]       import rows (global layout when no category)

Other
  categories, activity [N], export, undo, help, version

Dates accept YYYY-MM-DD, DD/MM/YYYY, today, tomorrow, weekday names and +Nd/+Nw."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).expect("valid date")
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("sum", &known), Some("summary"));
        assert_eq!(expand_command_abbrev("dr", &known), Some("drill"));
        assert_eq!(expand_command_abbrev("de", &known), None);
        assert_eq!(expand_command_abbrev("delete", &known), Some("delete"));
    }

    #[test]
    fn modifiers_are_split_from_words() {
        let (mods, words) = split_mods(
            &strings(&[
                "category:Penyesuaian",
                "sub:Publish Rate",
                "deadline:+7d",
                "status:in-progress",
                "jakarta",
                "--",
                "type:literal",
            ]),
            today(),
        )
        .expect("split");

        assert_eq!(
            mods,
            vec![
                Mod::Category("Penyesuaian".to_string()),
                Mod::SubCategory("Publish Rate".to_string()),
                Mod::Deadline("2024-03-27".to_string()),
                Mod::Status(Status::InProgress),
            ]
        );
        assert_eq!(words, strings(&["jakarta", "type:literal"]));
        assert_eq!(scope_of(&mods), (Some("Penyesuaian"), Some("Publish Rate")));
    }

    #[test]
    fn bad_modifier_values_are_errors() {
        assert!(split_mods(&strings(&["status:Overdue"]), today()).is_err());
        assert!(split_mods(&strings(&["deadline:someday"]), today()).is_err());
    }

    #[test]
    fn import_layout_needs_both_or_neither() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(import_layout(&taxonomy, &[]).expect("global"), ImportLayout::Global);

        let scoped = vec![
            Mod::Category("Penyesuaian".to_string()),
            Mod::SubCategory("Publish Rate".to_string()),
        ];
        assert_eq!(
            import_layout(&taxonomy, &scoped).expect("scoped"),
            ImportLayout::scoped("Penyesuaian", "Publish Rate")
        );

        let partial = vec![Mod::Category("Penyesuaian".to_string())];
        assert!(import_layout(&taxonomy, &partial).is_err());
    }

    #[test]
    fn edit_mods_cannot_move_a_job() {
        let mut draft = JobDraft::default();
        assert!(apply_mods(&mut draft, &[Mod::Category("Validasi".to_string())]).is_err());
        apply_mods(&mut draft, &[Mod::Note("cek ulang".to_string())]).expect("note");
        assert_eq!(draft.keterangan.as_deref(), Some("cek ulang"));
    }

    #[test]
    fn drill_keys_are_folded_to_canonical_labels() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(canonical_drill_key("in-progress", &taxonomy), IN_PROGRESS_KEY);
        assert_eq!(canonical_drill_key("overdue", &taxonomy), OVERDUE_KEY);
        assert_eq!(canonical_drill_key("validasi", &taxonomy), "Validasi");
        assert_eq!(canonical_drill_key("completed", &taxonomy), "Completed");
        assert_eq!(canonical_drill_key("Whatever", &taxonomy), "Whatever");
    }
}
