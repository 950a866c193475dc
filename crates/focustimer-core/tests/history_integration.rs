//! History store tests against an on-disk database.

use chrono::{Days, Local, NaiveDate, TimeZone, Utc};
use focustimer_core::{current_streak, Database, NewSession};

fn open() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("focustimer.db")).unwrap();
    (dir, db)
}

fn add_on(db: &Database, date: NaiveDate, minutes: u64) -> i64 {
    let started = Utc.from_utc_datetime(&date.and_hms_opt(10, 0, 0).unwrap());
    db.add_session(&NewSession::focus(started, minutes, 25, date)).unwrap()
}

#[test]
fn test_delete_by_id_removes_exactly_one_row() {
    let (_dir, db) = open();
    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let ids: Vec<i64> = (0..5).map(|i| add_on(&db, today, 20 + i)).collect();

    assert!(db.delete_session(ids[2]).unwrap());
    let remaining: Vec<i64> = db.all_sessions().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(remaining.len(), 4);
    assert!(!remaining.contains(&ids[2]));
    assert_eq!(db.total_focus_minutes().unwrap(), 20 + 21 + 23 + 24);
}

#[test]
fn test_streak_over_consecutive_and_gapped_days() {
    let (_dir, db) = open();
    let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
    for back in [0, 1, 2] {
        add_on(&db, today.checked_sub_days(Days::new(back)).unwrap(), 25);
    }
    assert_eq!(db.stats(today).unwrap().streak_days, 3);

    let (_dir2, gapped) = open();
    add_on(&gapped, today, 25);
    add_on(&gapped, today.checked_sub_days(Days::new(2)).unwrap(), 25);
    assert_eq!(gapped.stats(today).unwrap().streak_days, 1);
}

#[test]
fn test_stats_and_dates_agree() {
    let (_dir, db) = open();
    let today = Local::now().date_naive();
    add_on(&db, today, 25);
    add_on(&db, today, 25);
    add_on(&db, today.checked_sub_days(Days::new(1)).unwrap(), 50);

    let stats = db.stats(today).unwrap();
    let dates = db.session_dates().unwrap();
    assert_eq!(stats.active_days, dates.len() as u64);
    assert_eq!(stats.streak_days, current_streak(&dates, today));
    assert_eq!(stats.today_sessions, 2);
    assert_eq!(stats.today_focus_min, 50);
    assert_eq!(stats.total_focus_min, 100);
}

#[test]
fn test_clear_history_then_reuse() {
    let (_dir, db) = open();
    let day = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
    add_on(&db, day, 25);
    assert_eq!(db.delete_all_sessions().unwrap(), 1);
    assert!(db.all_sessions().unwrap().is_empty());
    let id = add_on(&db, day, 30);
    assert_eq!(db.session_by_id(id).unwrap().unwrap().duration_min, 30);
}
