use std::ffi::OsString;
use std::fs;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tally_core::export::to_csv;
use tally_core::filter::{FilterMode, view};
use tally_core::notify::TerminalNotifier;
use tally_core::persist::{self, FileStore, KeyValueStore};
use tally_core::session::{Session, SessionOptions};
use tally_core::task::Priority;
use tally_core::theme::Theme;
use tempfile::tempdir;

fn open(dir: &std::path::Path, now: chrono::DateTime<Utc>) -> Session {
    let store = FileStore::open(dir).expect("open file store");
    Session::open(
        Box::new(store),
        Box::new(TerminalNotifier::new(false)),
        SessionOptions::default(),
        now,
    )
}

#[test]
fn file_store_roundtrip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    let mut session = open(temp.path(), now);
    let milk = session.add("Buy milk", None, Priority::Low, now).expect("add milk");
    session
        .add("Pay rent", NaiveDate::from_ymd_opt(2026, 5, 3), Priority::High, now)
        .expect("add rent");
    session.toggle_completed(milk.id, now).expect("toggle");
    session.reorder(0, 1, now).expect("swap");
    session.set_theme(Theme::Dark);
    drop(session);

    let store = FileStore::open(temp.path()).expect("reopen file store");
    assert!(store.path_for(persist::TASKS_KEY).exists());
    assert_eq!(
        store.get(persist::THEME_KEY).expect("read theme").as_deref(),
        Some("dark")
    );

    let reopened = open(temp.path(), now);
    let texts: Vec<&str> = reopened.tasks().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Pay rent", "Buy milk"]);
    assert_eq!(reopened.theme(), Theme::Dark);

    let done = view(reopened.tasks(), FilterMode::Completed);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, milk.id);

    let csv = to_csv(reopened.tasks());
    assert!(csv.starts_with("ID,Task,DueDate,Priority,Completed\n"));
    assert!(csv.contains(",Pay rent,2026-05-03,high,false\n"));
    assert!(csv.contains(",Buy milk,,low,true\n"));
}

#[test]
fn undo_history_survives_restart() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    let mut session = open(temp.path(), now);
    session.add("A", None, Priority::Medium, now).expect("add A");
    session.add("B", None, Priority::Medium, now).expect("add B");
    session.reorder(0, 1, now).expect("swap");
    drop(session);

    let mut session = open(temp.path(), now + Duration::minutes(1));
    assert!(session.undo(now));
    let texts: Vec<&str> = session.tasks().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["A", "B"]);
    assert!(session.history().can_redo());
}

#[test]
fn cli_commands_write_through() {
    let temp = tempdir().expect("tempdir");
    let data = temp.path().join("data");
    let rc = temp.path().join("tallyrc");
    fs::write(&rc, "color=off\nnotify.enabled=off\n").expect("write rc");

    let run = |args: &[&str]| {
        let mut argv: Vec<OsString> = vec![
            "tally".into(),
            "--config".into(),
            rc.clone().into_os_string(),
            "--data".into(),
            data.clone().into_os_string(),
        ];
        argv.extend(args.iter().map(OsString::from));
        tally_core::run(argv)
    };

    run(&["add", "--priority", "high", "Write", "report"]).expect("add");
    run(&["add", "Call", "plumber", "--due", "2030-01-15"]).expect("add with due");
    run(&["done", "1"]).expect("toggle");
    run(&["swap", "1", "2"]).expect("swap");
    run(&["list", "--filter", "pending"]).expect("list");
    assert!(run(&["swap", "1", "5"]).is_err());
    assert!(run(&["add", "--due", "2030-02-30", "bad", "date"]).is_err());
    run(&["theme", "dark"]).expect("theme");

    let export_path = temp.path().join("out").join("tasks.csv");
    run(&["export", "--output", export_path.to_str().expect("utf8 path")]).expect("export");
    let csv = fs::read_to_string(&export_path).expect("read export");
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(",Call plumber,2030-01-15,medium,false"));
    assert!(rows[1].contains(",Write report,,high,true"));

    run(&["undo"]).expect("undo theme is not a list change");
    let store = FileStore::open(&data).expect("open data");
    let saved = persist::load_state(&store);
    let texts: Vec<&str> = saved.tasks.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Write report", "Call plumber"]);
    assert_eq!(saved.theme, Theme::Dark);
}
