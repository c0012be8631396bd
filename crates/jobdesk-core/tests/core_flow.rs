use chrono::NaiveDate;
use jobdesk_core::activity::Action;
use jobdesk_core::datastore::DataStore;
use jobdesk_core::filter::{DrillKey, Filter};
use jobdesk_core::import::{ImportLayout, ImportOutcome, import_into, parse_jobs};
use jobdesk_core::job::{Job, JobPatch, Status, User};
use jobdesk_core::stats::summarize;
use jobdesk_core::store::JobStore;
use jobdesk_core::taxonomy::Taxonomy;
use jobdesk_core::template::template_for;
use tempfile::tempdir;
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 22).expect("valid date")
}

fn job(category: &str, sub: &str, deadline: &str) -> Job {
    let mut job = Job::new_pending(category.to_string(), sub.to_string(), "2024-03-20".to_string());
    job.branch_dept = "Jakarta".to_string();
    job.job_type = "Update Tarif".to_string();
    job.deadline = deadline.to_string();
    job
}

#[test]
fn datastore_mutations_are_persisted_logged_and_undoable() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path())
        .expect("open datastore")
        .acting_as("rina@example.com");

    let first = job("Penyesuaian", "Publish Rate", "2024-03-21");
    let id = first.id;
    store.add_job(first).expect("add job");
    assert_eq!(store.jobs().expect("jobs").len(), 1);

    store
        .update_job(id, &JobPatch::status(Status::Completed))
        .expect("update job");
    let stored = store.jobs().expect("jobs");
    assert_eq!(stored[0].status, Status::Completed);
    assert!(!stored[0].is_overdue(today()));

    // Reopening sees the same collection.
    let reopened = DataStore::open(temp.path()).expect("reopen");
    assert_eq!(reopened.jobs().expect("jobs"), stored);

    store.delete_job(id).expect("delete job");
    assert!(store.jobs().expect("jobs").is_empty());

    let actions: Vec<Action> = store
        .load_activity(10)
        .expect("activity")
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(actions, vec![Action::Create, Action::Update, Action::Delete]);
    assert!(
        store
            .load_activity(10)
            .expect("activity")
            .iter()
            .all(|entry| entry.user == "rina@example.com")
    );

    assert!(store.undo().expect("undo delete"));
    assert_eq!(store.jobs().expect("jobs")[0].status, Status::Completed);
    assert!(store.undo().expect("undo update"));
    assert_eq!(store.jobs().expect("jobs")[0].status, Status::Pending);
    assert!(store.undo().expect("undo add"));
    assert!(store.jobs().expect("jobs").is_empty());
    assert!(!store.undo().expect("nothing left"));
}

#[test]
fn unknown_ids_are_errors_and_leave_no_trace() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    store
        .add_job(job("Validasi", "Tarif", "2024-04-01"))
        .expect("add job");

    let missing = Uuid::new_v4();
    assert!(store.update_job(missing, &JobPatch::status(Status::Completed)).is_err());
    assert!(store.delete_job(missing).is_err());

    let err = store
        .update_job(missing, &JobPatch::default())
        .expect_err("empty patch on unknown id");
    assert!(err.to_string().contains(&missing.to_string()));

    assert_eq!(store.jobs().expect("jobs").len(), 1);
    assert_eq!(store.load_activity(10).expect("activity").len(), 1);
}

#[test]
fn import_is_one_write_one_log_entry_one_undo_step() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path())
        .expect("open datastore")
        .acting_as("budi@example.com");
    store
        .add_job(job("Laporan", "Harian", "2024-04-01"))
        .expect("seed job");

    let user = User::new("budi@example.com", "Budi");
    let text = "\
Kategori,Sub Kategori,Tanggal,Cabang,Jenis,Status,Deadline,Keterangan
Penyesuaian,Publish Rate,2024-03-20,Jakarta,Update Tarif,Pending,2024-03-21,cek

,Validasi,2024-03-20,Bandung,Cek,Pending,2024-03-30,dropped
Validasi;Biaya;2024-03-20;Medan;Cek Biaya;In Progress;2024-03-30;titik koma
";
    let outcome = import_into(&mut store, text, &ImportLayout::Global, &user, today())
        .expect("import");
    assert_eq!(outcome, ImportOutcome::Imported { count: 2 });

    let jobs = store.jobs().expect("jobs");
    assert_eq!(jobs.len(), 3);
    assert!(jobs[1..].iter().all(|j| j.created_by.as_deref() == Some("budi@example.com")));

    let activity = store.load_activity(10).expect("activity");
    assert_eq!(activity.len(), 2);
    assert_eq!(activity[1].action, Action::BulkImport);

    let summary = summarize(&jobs, &Taxonomy::builtin(), today());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.overdue, 1);
    assert_eq!(summary.in_progress, 1);

    let in_progress = Filter::new(DrillKey::InProgress, Some("medan"));
    assert_eq!(in_progress.apply(&jobs, today()).len(), 1);

    assert!(store.undo().expect("undo import"));
    assert_eq!(store.jobs().expect("jobs").len(), 1);
}

#[test]
fn empty_upload_writes_nothing() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let user = User::new("u@example.com", "U");

    let outcome = import_into(
        &mut store,
        "header only\n\n",
        &ImportLayout::scoped("Penyesuaian", "Publish Rate"),
        &user,
        today(),
    )
    .expect("import");
    assert_eq!(outcome, ImportOutcome::NoValidRows);
    assert!(store.load_activity(10).expect("activity").is_empty());
    assert!(!store.undo().expect("no undo step"));
}

#[test]
fn written_templates_import_cleanly() {
    let temp = tempdir().expect("tempdir");
    let layouts = [
        ImportLayout::scoped("Penyesuaian", "Publish Rate"),
        ImportLayout::scoped("Produksi Master Data", "Master Vendor"),
        ImportLayout::Global,
    ];

    for layout in layouts {
        let template = template_for(&layout, today());
        let path = template.write_to(temp.path()).expect("write template");
        let text = std::fs::read_to_string(&path).expect("read template");

        let jobs = parse_jobs(&text, &layout, "u@example.com", today());
        assert_eq!(jobs.len(), 1, "{}", template.file_name);
        assert!(!jobs[0].is_overdue(today()));
    }
}

#[test]
fn concurrent_imports_queue_instead_of_losing_batches() {
    const IMPORTERS: usize = 8;

    let temp = tempdir().expect("tempdir");
    let dir = temp.path();
    DataStore::open(dir).expect("open datastore");

    std::thread::scope(|scope| {
        for n in 0..IMPORTERS {
            scope.spawn(move || {
                let email = format!("importer{n}@example.com");
                let mut store = DataStore::open(dir)
                    .expect("open datastore")
                    .acting_as(&email);
                let user = User::new(email.as_str(), "Importer");
                let text = format!(
                    "header\n2024-03-20,Cabang {n},Update Tarif,Pending,2024-03-30,batch {n}\n"
                );
                let outcome = import_into(
                    &mut store,
                    &text,
                    &ImportLayout::scoped("Penyesuaian", "Publish Rate"),
                    &user,
                    today(),
                )
                .expect("import");
                assert_eq!(outcome, ImportOutcome::Imported { count: 1 });
            });
        }
    });

    let store = DataStore::open(dir).expect("reopen");
    let jobs = store.jobs().expect("jobs");
    assert_eq!(jobs.len(), IMPORTERS);
    for n in 0..IMPORTERS {
        assert!(jobs.iter().any(|j| j.branch_dept == format!("Cabang {n}")));
    }

    let activity = store.load_activity(100).expect("activity");
    assert_eq!(activity.len(), IMPORTERS);
    assert!(activity.iter().all(|entry| entry.action == Action::BulkImport));

    for remaining in (0..IMPORTERS).rev() {
        assert!(store.undo().expect("undo import"));
        assert_eq!(store.jobs().expect("jobs").len(), remaining);
    }
    assert!(!store.undo().expect("nothing left"));
}

#[test]
fn saved_change_stands_when_activity_append_fails() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    std::fs::remove_file(&store.activity_path).expect("remove activity log");
    std::fs::create_dir(&store.activity_path).expect("block activity log");

    store
        .add_job(job("Laporan", "Bulanan", "2024-04-30"))
        .expect("add succeeds without the activity entry");
    assert_eq!(store.jobs().expect("jobs").len(), 1);
    assert!(store.undo().expect("undo step recorded"));
}
