use std::collections::HashSet;
use std::sync::Mutex;

use aesd::{AesdError, BoundedCommandLog, CommandEntry};
use crossbeam_utils::thread;

fn entry(s: &str) -> CommandEntry {
    CommandEntry::new(s).unwrap()
}

fn log_of(capacity: usize, commands: &[&str]) -> BoundedCommandLog {
    let mut log = BoundedCommandLog::new(capacity);
    for cmd in commands {
        if let Some(evicted) = log.add_entry(entry(cmd)) {
            evicted.release();
        }
    }
    log
}

fn stored(log: &BoundedCommandLog) -> Vec<String> {
    log.iter()
        .map(|e| String::from_utf8(e.as_bytes().to_vec()).unwrap())
        .collect()
}

#[test]
fn add_entry_below_capacity_evicts_nothing() {
    let mut log = BoundedCommandLog::new(3);
    assert!(log.add_entry(entry("a\n")).is_none());
    assert!(log.add_entry(entry("b\n")).is_none());
    assert_eq!(log.len(), 2);
    assert!(!log.is_full());
    assert_eq!(log.total_size(), 4);
    assert_eq!(log.first_index(), 0);
}

#[test]
fn add_entry_at_capacity_evicts_exactly_the_oldest() {
    let mut log = log_of(3, &["a\n", "b\n", "c\n"]);
    assert!(log.is_full());

    let evicted = log.add_entry(entry("d\n")).expect("oldest entry is evicted");
    assert_eq!(evicted.into_inner(), entry("a\n"));
    assert_eq!(stored(&log), vec!["b\n", "c\n", "d\n"]);
    assert_eq!(log.len(), 3);
    assert_eq!(log.total_size(), 6);
    assert_eq!(log.first_index(), 1);
    assert_eq!(log.contents(), b"b\nc\nd\n");
}

#[test]
fn log_always_holds_the_most_recent_entries() {
    let commands: Vec<String> = (0..50).map(|i| format!("command {}\n", i)).collect();
    for capacity in 1..=12 {
        let mut log = BoundedCommandLog::new(capacity);
        let mut evicted = Vec::new();
        for (i, cmd) in commands.iter().enumerate() {
            if let Some(old) = log.add_entry(entry(cmd)) {
                evicted.push(old.into_inner());
            }
            let expected_len = (i + 1).min(capacity);
            assert_eq!(log.len(), expected_len);
            let expected: Vec<&String> = commands[i + 1 - expected_len..=i].iter().collect();
            let actual = stored(&log);
            assert_eq!(actual.iter().collect::<Vec<_>>(), expected);
        }
        // every evicted entry came out once, in insertion order
        let evicted: Vec<CommandEntry> = evicted;
        assert_eq!(evicted.len(), commands.len() - capacity);
        for (old, cmd) in evicted.iter().zip(&commands) {
            assert_eq!(old.as_bytes(), cmd.as_bytes());
        }
    }
}

#[test]
fn find_entry_for_offset_covers_every_stored_byte() {
    let log = log_of(3, &["first\n", "2\n", "third one\n", "fourth\n"]);
    let contents = log.contents();
    assert_eq!(contents, b"2\nthird one\nfourth\n");

    for pos in 0..log.total_size() {
        let (entry, offset) = log.find_entry_for_offset(pos).expect("offset is in range");
        assert_eq!(entry.as_bytes()[offset], contents[pos]);
        assert!(offset < entry.len());
    }
}

#[test]
fn find_entry_for_offset_at_or_past_the_end_is_not_found() {
    let log = log_of(3, &["a\n", "bc\n"]);
    assert!(log.find_entry_for_offset(log.total_size()).is_none());
    assert!(log.find_entry_for_offset(log.total_size() + 100).is_none());
    assert!(BoundedCommandLog::new(2).find_entry_for_offset(0).is_none());
}

#[test]
fn find_entry_for_offset_resolves_entry_boundaries() {
    let log = log_of(10, &["ab\n", "cde\n"]);
    let (e, off) = log.find_entry_for_offset(2).unwrap();
    assert_eq!((e.as_bytes(), off), (&b"ab\n"[..], 2));
    let (e, off) = log.find_entry_for_offset(3).unwrap();
    assert_eq!((e.as_bytes(), off), (&b"cde\n"[..], 0));
}

#[test]
fn translate_command_offset_is_relative_to_the_oldest_entry() {
    let log = log_of(3, &["a\n", "b\n", "c\n", "d\n"]);
    assert_eq!(log.translate_command_offset(0, 0).unwrap(), 0);
    assert_eq!(log.translate_command_offset(1, 1).unwrap(), 3);
    assert_eq!(log.translate_command_offset(2, 0).unwrap(), 4);
}

#[test]
fn translate_command_offset_rejects_out_of_range_targets() {
    let log = log_of(3, &["b\n", "c\n", "d\n"]);
    assert!(matches!(
        log.translate_command_offset(3, 0),
        Err(AesdError::OutOfRange {
            write_cmd: 3,
            write_cmd_offset: 0
        })
    ));
    assert!(matches!(
        log.translate_command_offset(5, 0),
        Err(AesdError::OutOfRange { .. })
    ));
    assert!(matches!(
        log.translate_command_offset(1, 2),
        Err(AesdError::OutOfRange { .. })
    ));

    let empty = BoundedCommandLog::new(3);
    assert!(matches!(
        empty.translate_command_offset(0, 0),
        Err(AesdError::OutOfRange { .. })
    ));
}

#[test]
fn translate_then_find_returns_the_same_entry_and_offset() {
    let log = log_of(4, &["zero\n", "one\n", "two two\n", "3\n", "four!\n", "5\n"]);
    for (index, target) in log.iter().enumerate() {
        for k in 0..target.len() {
            let pos = log
                .translate_command_offset(index as u32, k as u32)
                .unwrap();
            let (found, offset) = log.find_entry_for_offset(pos as usize).unwrap();
            assert_eq!(found, target);
            assert_eq!(offset, k);
        }
    }
}

#[test]
#[should_panic]
fn zero_capacity_is_rejected() {
    let _ = BoundedCommandLog::new(0);
}

// Each thread appends a distinct, tagged command under one lock. With a tiny capacity most
// of them are evicted while other threads are still adding.
#[test]
fn concurrent_appends_keep_every_command_exactly_once() {
    const THREADS: usize = 32;
    const CAPACITY: usize = 4;

    let log = Mutex::new(BoundedCommandLog::new(CAPACITY));
    let evicted = Mutex::new(Vec::new());

    thread::scope(|s| {
        for i in 0..THREADS {
            let log = &log;
            let evicted = &evicted;
            s.spawn(move |_| {
                let cmd = entry(&format!("{}{}\n", (b'A' + i as u8) as char, i));
                let old = log.lock().unwrap().add_entry(cmd);
                if let Some(old) = old {
                    evicted.lock().unwrap().push(old.into_inner());
                }
            });
        }
    })
    .unwrap();

    let log = log.into_inner().unwrap();
    let evicted = evicted.into_inner().unwrap();
    assert_eq!(log.len(), CAPACITY);
    assert_eq!(evicted.len(), THREADS - CAPACITY);
    assert_eq!(log.first_index(), (THREADS - CAPACITY) as u64);

    let mut seen = HashSet::new();
    for cmd in log.iter().chain(evicted.iter()) {
        assert!(seen.insert(cmd.as_bytes().to_vec()), "duplicate {:?}", cmd);
    }
    let expected: HashSet<Vec<u8>> = (0..THREADS)
        .map(|i| format!("{}{}\n", (b'A' + i as u8) as char, i).into_bytes())
        .collect();
    assert_eq!(seen, expected);
    assert_eq!(
        log.total_size(),
        log.iter().map(CommandEntry::len).sum::<usize>()
    );
}
