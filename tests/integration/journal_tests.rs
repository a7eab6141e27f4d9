//! Daily journal on a real temporary directory.

use chrono::{Local, NaiveDate, TimeZone};

use domisafe::adapters::journal::{self, DailyJournal};
use domisafe::app::ports::{JournalPort, Stream};
use domisafe::app::reading::{Reading, Value};

#[test]
fn environmental_record_reads_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let at = Local.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
    let record = Reading::new(at)
        .with("temperature", 21.5)
        .with("humidity", 40.0);

    let journal = DailyJournal::new(dir.path()).unwrap();
    journal.append(Stream::Environmental, &record).unwrap();
    journal.close();

    let path = dir.path().join("20261018_environmental_data.txt");
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("\"temperature\":21.5"));
    assert!(text.contains("\"humidity\":40.0"));

    let back = journal::read_records(&path).unwrap();
    assert_eq!(back, vec![record]);
    assert_eq!(back[0].get("temperature"), Some(&Value::Number(21.5)));
}

#[test]
fn streams_go_to_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let at = Local.with_ymd_and_hms(2026, 10, 18, 23, 59, 0).unwrap();
    let journal = DailyJournal::new(dir.path().join("logs")).unwrap();

    journal
        .append(Stream::Security, &Reading::new(at).with("motion_detected", true))
        .unwrap();
    journal
        .append(Stream::DeviceStatus, &Reading::new(at).with("Lamps.red", false))
        .unwrap();
    assert_eq!(journal.sync_all(), 0);

    let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    for stream in [Stream::Security, Stream::DeviceStatus] {
        let records = journal::read_records(journal.path_for(stream, day)).unwrap();
        assert_eq!(records.len(), 1);
    }
    assert!(!journal.path_for(Stream::Environmental, day).exists());
}
