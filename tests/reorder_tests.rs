mod common;
use common::*;

#[test]
fn out_of_order_packets_come_out_sorted() {
    // Tolerance 1s; the big jump evicts everything earlier, ascending.
    let input = [
        packet("2019-03-01 08:00:00.000000", "F0"),
        packet("2019-03-01 08:00:00.500000", "F1"),
        packet("2019-03-01 08:00:00.250000", "F2"),
        packet("2019-03-01 08:00:03.000000", "F3"),
    ]
    .join("\n");

    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--reorder", "1000000"], &input);
    assert_eq!(code, 0);
    let order: Vec<&str> = stdout
        .lines()
        .map(|line| {
            let start = line.find("type_id\">").unwrap() + "type_id\">".len();
            let end = line[start..].find('<').unwrap() + start;
            &line[start..end]
        })
        .collect();
    assert_eq!(order, ["F0", "F2", "F1", "F3"]);
}

#[test]
fn sorted_input_with_minimal_tolerance_is_identity() {
    let packets: Vec<String> = (0..50)
        .map(|i| {
            packet(
                &format!("2019-03-01 08:00:00.{:06}", i * 10),
                &format!("P{i}"),
            )
        })
        .collect();
    let input = packets.join("\n");
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--reorder", "1"], &input);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        packets.iter().map(String::as_str).collect::<Vec<_>>()
    );
}

#[test]
fn the_window_is_flushed_at_end_of_input() {
    // Everything fits in the window; without the final flush the output
    // would be empty.
    let input = [
        packet("2019-03-01 08:00:00.000002", "B"),
        packet("2019-03-01 08:00:00.000001", "A"),
    ]
    .join("\n");
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--reorder", "1000000"], &input);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(">A<"));
    assert!(lines[1].contains(">B<"));
}

#[test]
fn unparseable_timestamps_warn_and_drop() {
    let input = [
        packet("garbage", "BAD"),
        packet("2019-03-01 08:00:00", "GOOD"),
    ]
    .join("\n");
    let (stdout, stderr, code) = run_dmsieve_with_input(&["--reorder", "1000"], &input);
    assert_eq!(code, 0);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stderr.contains("Warning (packet timestamp = garbage)"));
}
