use aesd::{CommandEntry, PartialAssembler};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn as_strings(commands: Vec<CommandEntry>) -> Vec<String> {
    commands
        .into_iter()
        .map(|c| String::from_utf8(c.into_bytes()).unwrap())
        .collect()
}

#[test]
fn partial_writes_are_joined_into_commands() {
    let mut assembler = PartialAssembler::new();
    assembler.feed(b"ab").unwrap();
    assert!(assembler.drain_commands().is_empty());
    assert_eq!(assembler.pending(), b"ab");

    assembler.feed(b"c\ndef\n").unwrap();
    assert_eq!(as_strings(assembler.drain_commands()), vec!["abc\n", "def\n"]);
    assert!(assembler.is_empty());
}

#[test]
fn trailing_partial_command_is_kept() {
    let mut assembler = PartialAssembler::new();
    assembler.feed(b"one\ntwo\nthr").unwrap();
    assert_eq!(as_strings(assembler.drain_commands()), vec!["one\n", "two\n"]);
    assert_eq!(assembler.pending(), b"thr");

    assembler.feed(b"ee\n").unwrap();
    assert_eq!(as_strings(assembler.drain_commands()), vec!["three\n"]);
    assert!(assembler.is_empty());
}

#[test]
fn empty_lines_are_commands_too() {
    let mut assembler = PartialAssembler::new();
    assembler.feed(b"\n\nx\n").unwrap();
    assert_eq!(as_strings(assembler.drain_commands()), vec!["\n", "\n", "x\n"]);
}

#[test]
fn next_command_yields_one_command_at_a_time() {
    let mut assembler = PartialAssembler::new();
    assembler.feed(b"a\nb\n").unwrap();
    assert_eq!(assembler.next_command().unwrap().as_bytes(), b"a\n");
    assert_eq!(assembler.pending(), b"b\n");
    assert_eq!(assembler.next_command().unwrap().as_bytes(), b"b\n");
    assert!(assembler.next_command().is_none());
}

#[test]
fn clear_discards_pending_bytes() {
    let mut assembler = PartialAssembler::new();
    assembler.feed(b"no newline yet").unwrap();
    assembler.clear();
    assert!(assembler.is_empty());
    assembler.feed(b"fresh\n").unwrap();
    assert_eq!(as_strings(assembler.drain_commands()), vec!["fresh\n"]);
}

#[test]
fn any_chunking_yields_the_same_commands() {
    let stream: Vec<u8> = (0..200)
        .map(|i| format!("command number {} {}\n", i, "x".repeat(i % 17)))
        .collect::<String>()
        .into_bytes();
    let expected: Vec<String> = String::from_utf8(stream.clone())
        .unwrap()
        .split_inclusive('\n')
        .map(String::from)
        .collect();

    let mut rng = SmallRng::seed_from_u64(0x0aed);
    for _ in 0..20 {
        let mut assembler = PartialAssembler::new();
        let mut commands = Vec::new();
        let mut rest = &stream[..];
        while !rest.is_empty() {
            let len = rng.gen_range(1..=rest.len().min(64));
            let (chunk, tail) = rest.split_at(len);
            assembler.feed(chunk).unwrap();
            commands.extend(as_strings(assembler.drain_commands()));
            rest = tail;
        }
        assert_eq!(commands, expected);
        assert!(assembler.is_empty());
    }
}
