//! Lifecycle engine scenarios against a real SQLite store.

use std::io::Cursor;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use qz_core::import::{ImportError, Importer, TogglCsv, import_all};
use qz_core::lifecycle::{StateError, TemporalError};
use qz_core::report::{self, LogRange};
use qz_core::{
    Activity, IntervalStore, Labels, Message, Project, State, Status, StopRequest, TrackError,
    Tracker,
};
use qz_db::Database;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

/// Execution instant used by every scenario unless stated otherwise.
fn evening() -> NaiveDateTime {
    at(20, 0)
}

fn labels(message: &str, project: &str) -> Labels {
    Labels {
        message: Some(Message::new(message).unwrap()),
        project: Some(Project::new(project).unwrap()),
    }
}

fn add(
    db: &mut Database,
    labels: Labels,
    start: NaiveDateTime,
    stop: NaiveDateTime,
) -> Result<Activity, TrackError> {
    db.atomically(|store| Tracker::new(store, evening()).add(labels, start, stop))
}

fn start_at(db: &mut Database, start: NaiveDateTime) -> Result<Activity, TrackError> {
    db.atomically(|store| Tracker::new(store, evening()).start(Labels::default(), Some(start)))
}

fn open_count(db: &Database) -> usize {
    usize::from(db.store().get_open().unwrap().is_some())
}

fn all(db: &Database) -> Vec<Activity> {
    db.store()
        .query(at(0, 0), at(23, 59), evening())
        .unwrap()
}

#[test]
fn start_then_stop_scenario() {
    let mut db = Database::open_in_memory().unwrap();

    let started = start_at(&mut db, at(9, 0)).unwrap();
    assert_eq!(started.start, at(9, 0));

    match report::status(&db.store(), evening()).unwrap() {
        Status::Tracking { activity, .. } => assert_eq!(activity.start, at(9, 0)),
        Status::Idle => panic!("expected tracking"),
    }

    let closed = db
        .atomically(|store| {
            Tracker::new(store, evening()).stop(StopRequest {
                at: Some(at(9, 30)),
                ..StopRequest::default()
            })
        })
        .unwrap();
    assert_eq!(closed.id, started.id);
    assert_eq!(closed.start, at(9, 0));
    assert_eq!(closed.stop, Some(at(9, 30)));

    assert_eq!(report::status(&db.store(), evening()).unwrap(), Status::Idle);
}

#[test]
fn status_follows_tracker_state() {
    let mut db = Database::open_in_memory().unwrap();
    let now = evening() + TimeDelta::milliseconds(750);
    assert_eq!(Tracker::new(&db.store(), now).state().unwrap(), State::Idle);
    assert_eq!(report::status(&db.store(), now).unwrap(), Status::Idle);

    let started = start_at(&mut db, at(19, 0)).unwrap();
    let State::Tracking(open) = Tracker::new(&db.store(), now).state().unwrap() else {
        panic!("expected tracking");
    };
    assert_eq!(open, started);
    // Elapsed time is measured from the whole-second instant
    assert_eq!(
        report::status(&db.store(), now).unwrap(),
        Status::Tracking {
            activity: open,
            elapsed: TimeDelta::hours(1),
        }
    );
}

#[test]
fn start_while_tracking_is_invalid_state() {
    let mut db = Database::open_in_memory().unwrap();
    start_at(&mut db, at(9, 0)).unwrap();

    let err = db
        .atomically(|store| Tracker::new(store, evening()).start(Labels::default(), None))
        .unwrap_err();
    assert!(matches!(
        err,
        TrackError::InvalidState(StateError::AlreadyRunning { .. })
    ));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(open_count(&db), 1);
}

#[test]
fn stop_while_idle_is_invalid_state() {
    let mut db = Database::open_in_memory().unwrap();
    let err = db
        .atomically(|store| Tracker::new(store, evening()).stop(StopRequest::default()))
        .unwrap_err();
    assert!(matches!(
        err,
        TrackError::InvalidState(StateError::NotRunning)
    ));
    assert_eq!(err.to_string(), "no running activity");
}

#[test]
fn start_in_future_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let err = db
        .atomically(|store| Tracker::new(store, at(9, 0)).start(Labels::default(), Some(at(9, 1))))
        .unwrap_err();
    assert!(matches!(
        err,
        TrackError::TemporalViolation(TemporalError::InFuture { .. })
    ));
    assert_eq!(err.exit_code(), 4);
    assert!(all(&db).is_empty());
}

#[test]
fn start_in_past_then_stop_now_closes_record() {
    let mut db = Database::open_in_memory().unwrap();
    let now = at(12, 0);
    db.atomically(|store| Tracker::new(store, now).start(Labels::default(), Some(at(11, 0))))
        .unwrap();

    let closed = db
        .atomically(|store| Tracker::new(store, now).stop(StopRequest::default()))
        .unwrap();
    assert_eq!(closed.stop, Some(now));
    assert!(closed.stop.unwrap() > closed.start);
    assert_eq!(open_count(&db), 0);
}

#[test]
fn stop_at_or_before_start_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    start_at(&mut db, at(9, 0)).unwrap();

    for stop in [at(9, 0), at(8, 0)] {
        let err = db
            .atomically(|store| {
                Tracker::new(store, evening()).stop(StopRequest {
                    at: Some(stop),
                    ..StopRequest::default()
                })
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TrackError::TemporalViolation(TemporalError::NotAfterStart { .. })
        ));
    }
    assert_eq!(open_count(&db), 1);
}

#[test]
fn stop_overwrites_only_given_labels() {
    let mut db = Database::open_in_memory().unwrap();
    db.atomically(|store| {
        Tracker::new(store, evening()).start(labels("draft", "manhattan"), Some(at(9, 0)))
    })
    .unwrap();

    let closed = db
        .atomically(|store| {
            Tracker::new(store, evening()).stop(StopRequest {
                labels: Labels {
                    message: Some(Message::new("final").unwrap()),
                    project: None,
                },
                at: Some(at(10, 0)),
                discard: false,
            })
        })
        .unwrap();
    assert_eq!(closed.message.unwrap().as_str(), "final");
    assert_eq!(closed.project.unwrap().as_str(), "manhattan");
}

#[test]
fn stop_discard_removes_open_record() {
    let mut db = Database::open_in_memory().unwrap();
    start_at(&mut db, at(9, 0)).unwrap();

    db.atomically(|store| {
        Tracker::new(store, evening()).stop(StopRequest {
            discard: true,
            ..StopRequest::default()
        })
    })
    .unwrap();

    assert!(all(&db).is_empty());
    let state = Tracker::new(&db.store(), evening()).state().unwrap();
    assert_eq!(state, State::Idle);
}

#[test]
fn add_inside_open_record_is_overlap() {
    let mut db = Database::open_in_memory().unwrap();
    start_at(&mut db, at(9, 0)).unwrap();

    let err = add(&mut db, Labels::default(), at(9, 30), at(10, 0)).unwrap_err();
    assert!(matches!(
        err,
        TrackError::TemporalViolation(TemporalError::Overlap { .. })
    ));
    assert_eq!(
        err.to_string(),
        format!(
            "overlapping activities: conflicts with {}",
            db.store().get_open().unwrap().unwrap().id.short()
        )
    );

    add(&mut db, Labels::default(), at(8, 0), at(9, 0)).unwrap();
}

#[test]
fn start_before_existing_closed_record_is_overlap() {
    let mut db = Database::open_in_memory().unwrap();
    add(&mut db, Labels::default(), at(10, 0), at(11, 0)).unwrap();

    let err = start_at(&mut db, at(9, 0)).unwrap_err();
    assert!(matches!(
        err,
        TrackError::TemporalViolation(TemporalError::Overlap { .. })
    ));

    start_at(&mut db, at(11, 0)).unwrap();
}

#[test]
fn add_with_inverted_interval_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    for (start, stop) in [(at(10, 0), at(10, 0)), (at(11, 0), at(10, 0))] {
        let err = add(&mut db, Labels::default(), start, stop).unwrap_err();
        assert!(matches!(
            err,
            TrackError::TemporalViolation(TemporalError::NotAfterStart { .. })
        ));
    }
    assert!(all(&db).is_empty());
}

#[test]
fn add_in_future_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let err = db
        .atomically(|store| {
            Tracker::new(store, at(10, 30)).add(Labels::default(), at(10, 0), at(11, 0))
        })
        .unwrap_err();
    assert!(matches!(
        err,
        TrackError::TemporalViolation(TemporalError::InFuture { field: "stop", .. })
    ));
}

#[test]
fn contained_overlap_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    add(&mut db, labels("x", "p"), at(10, 0), at(11, 0)).unwrap();

    let err = add(&mut db, labels("y", "p"), at(10, 30), at(10, 45)).unwrap_err();
    assert!(matches!(
        err,
        TrackError::TemporalViolation(TemporalError::Overlap { .. })
    ));
    assert_eq!(all(&db).len(), 1);
}

#[test]
fn back_to_back_intervals_are_accepted() {
    let mut db = Database::open_in_memory().unwrap();
    add(&mut db, Labels::default(), at(10, 0), at(11, 0)).unwrap();
    add(&mut db, Labels::default(), at(11, 0), at(12, 0)).unwrap();
    assert_eq!(all(&db).len(), 2);
}

#[test]
fn add_then_query_returns_the_record() {
    let mut db = Database::open_in_memory().unwrap();
    let added = add(&mut db, labels("call with leslie", "manhattan"), at(13, 0), at(14, 0))
        .unwrap();

    let found = db.store().query(at(13, 0), at(14, 0), evening()).unwrap();
    assert_eq!(found, vec![added]);
    let found = &found[0];
    assert_eq!(found.message.as_ref().unwrap().as_str(), "call with leslie");
    assert_eq!(found.project.as_ref().unwrap().as_str(), "manhattan");
    assert_eq!(found.start, at(13, 0));
    assert_eq!(found.stop, Some(at(14, 0)));
}

#[test]
fn random_sequences_keep_invariants() {
    let mut db = Database::open_in_memory().unwrap();
    // Deterministic pseudo-random walk over start/stop/add
    let mut seed: u32 = 0x9e37_79b9;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        seed
    };

    for _ in 0..200 {
        let a = next() % (20 * 60);
        let b = next() % (20 * 60);
        let minute = |m: u32| at(m / 60, m % 60);
        let _ = match next() % 3 {
            0 => start_at(&mut db, minute(a)).map(|_| ()),
            1 => db
                .atomically(|store| {
                    Tracker::new(store, evening()).stop(StopRequest {
                        at: Some(minute(b)),
                        ..StopRequest::default()
                    })
                })
                .map(|_| ()),
            _ => add(&mut db, Labels::default(), minute(a), minute(b)).map(|_| ()),
        };

        let records = all(&db);
        assert!(records.iter().filter(|r| r.is_open()).count() <= 1);
        for (i, x) in records.iter().enumerate() {
            for y in &records[i + 1..] {
                assert!(!x.span().overlaps(&y.span()), "{x:?} overlaps {y:?}");
            }
        }
    }
}

#[test]
fn concurrent_start_loses_to_the_lock_holder() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("store.db");
    let mut first = Database::open(&path).unwrap();
    let mut second = Database::open_with_busy_timeout(&path, Duration::from_millis(50)).unwrap();

    let started = first
        .atomically(|store| {
            let started = Tracker::new(store, evening()).start(Labels::default(), Some(at(9, 0)))?;
            let err = second
                .atomically(|store| {
                    Tracker::new(store, evening()).start(Labels::default(), Some(at(10, 0)))
                })
                .unwrap_err();
            assert!(matches!(err, TrackError::ConstraintViolation(_)), "{err:?}");
            assert_eq!(err.exit_code(), 7);
            Ok::<_, TrackError>(started)
        })
        .unwrap();

    assert_eq!(open_count(&first), 1);
    let open = second.store().get_open().unwrap().unwrap();
    assert_eq!(open.id, started.id);
    assert_eq!(all(&second).len(), 1);
}

#[test]
fn delete_by_prefix() {
    let mut db = Database::open_in_memory().unwrap();
    let added = add(&mut db, Labels::default(), at(10, 0), at(11, 0)).unwrap();

    let deleted = db
        .atomically(|store| Tracker::new(store, evening()).delete(added.id.short()))
        .unwrap();
    assert_eq!(deleted.id, added.id);
    assert!(all(&db).is_empty());
}

#[test]
fn delete_open_record_returns_to_idle() {
    let mut db = Database::open_in_memory().unwrap();
    let started = start_at(&mut db, at(9, 0)).unwrap();

    db.atomically(|store| Tracker::new(store, evening()).delete(started.id.as_str()))
        .unwrap();
    assert_eq!(open_count(&db), 0);
}

#[test]
fn delete_missing_or_ambiguous_prefix_never_mutates() {
    let mut db = Database::open_in_memory().unwrap();
    for (id, start) in [("abcd-0001", 8), ("abcd-0002", 9), ("ffff-0003", 10)] {
        db.store()
            .insert(&qz_core::NewActivity {
                id: Some(qz_core::ActivityId::new(id).unwrap()),
                message: None,
                project: None,
                start: at(start, 0),
                stop: Some(at(start, 30)),
            })
            .unwrap();
    }

    let delete = |db: &mut Database, prefix: &str| {
        db.atomically(|store| Tracker::new(store, evening()).delete(prefix))
            .unwrap_err()
    };

    let err = delete(&mut db, "abcd");
    assert!(matches!(err, TrackError::AmbiguousId(_)));
    assert_eq!(err.exit_code(), 6);
    assert_eq!(
        err.to_string(),
        "ambiguous uuid 'abcd': use the full identifier"
    );

    let err = delete(&mut db, "0000");
    assert!(matches!(err, TrackError::NotFound(_)));
    assert_eq!(err.exit_code(), 5);
    assert_eq!(err.to_string(), "could not find matching uuid '0000'");

    let err = delete(&mut db, "fff");
    assert!(matches!(err, TrackError::AmbiguousId(_)));

    assert_eq!(all(&db).len(), 3);

    db.atomically(|store| Tracker::new(store, evening()).delete("ffff"))
        .unwrap();
    assert_eq!(all(&db).len(), 2);
}

#[test]
fn log_reports_recorded_days() {
    let mut db = Database::open_in_memory().unwrap();
    add(&mut db, Labels::default(), at(10, 0), at(11, 0)).unwrap();
    start_at(&mut db, at(19, 0)).unwrap();

    let range = LogRange::resolve(None, None, evening(), 7);
    let report = report::log(&db.store(), range, evening()).unwrap();
    assert_eq!(report.days.len(), 1);
    assert_eq!(report.days[0].activities.len(), 2);
    assert_eq!(report.days[0].total_seconds, 2 * 3600);
}

const TOGGL_EXPORT: &str = "\
Description,Project,Start date,Start time,End date,End time
first,manhattan,2024-01-01,08:00:00,2024-01-01,09:00:00
second,,2024-01-01,09:00:00,2024-01-01,10:00:00
";

#[test]
fn import_adds_every_record() {
    let mut db = Database::open_in_memory().unwrap();
    let records = TogglCsv.parse(&mut Cursor::new(TOGGL_EXPORT)).unwrap();

    let imported = db
        .atomically(|store| import_all(&Tracker::new(store, evening()), records))
        .unwrap();
    assert_eq!(imported.len(), 2);
    assert_eq!(all(&db).len(), 2);
}

#[test]
fn import_aborts_whole_batch_on_violation() {
    let mut db = Database::open_in_memory().unwrap();
    add(&mut db, Labels::default(), at(9, 30), at(9, 45)).unwrap();
    let records = TogglCsv.parse(&mut Cursor::new(TOGGL_EXPORT)).unwrap();

    let err = db
        .atomically(|store| import_all(&Tracker::new(store, evening()), records))
        .unwrap_err();
    match err {
        ImportError::Rejected { record, source } => {
            assert_eq!(record, 2);
            assert!(matches!(
                source,
                TrackError::TemporalViolation(TemporalError::Overlap { .. })
            ));
        }
        other => panic!("expected rejected record, got {other:?}"),
    }
    // The first record was rolled back with the rest
    assert_eq!(all(&db).len(), 1);
}
