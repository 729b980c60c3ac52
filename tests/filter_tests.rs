mod common;
use common::*;

#[test]
fn match_all_reproduces_the_input_fragment_for_fragment() {
    let packets = [
        packet("2019-03-01 08:00:00.000001", "LTE_RRC_OTA_Packet"),
        packet("2019-03-01 08:00:00.000002", "LTE_PHY_PDSCH_Packet"),
        packet("2019-03-01 08:00:00.000003", "LTE_MAC_Rach_Trigger"),
    ];
    let input = packets.join("\n");
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--filter", ".*"], &input);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, packets.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn only_matching_type_ids_pass() {
    let input = [
        packet("2019-03-01 08:00:00", "LTE_RRC_OTA_Packet"),
        packet("2019-03-01 08:00:01", "LTE_PHY_PDSCH_Packet"),
        packet("2019-03-01 08:00:02", "LTE_RRC_Serv_Cell_Info"),
    ]
    .join("");
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--filter", "LTE_RRC_.*"], &input);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("LTE_RRC_OTA_Packet"));
    assert!(lines[1].contains("LTE_RRC_Serv_Cell_Info"));
}

#[test]
fn match_is_whole_string_not_substring() {
    let input = packet("2019-03-01 08:00:00", "LTE_RRC_OTA_Packet");
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--filter", "LTE_RRC"], &input);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
}

#[test]
fn alternation_works() {
    let input = [
        packet("2019-03-01 08:00:00", "A"),
        packet("2019-03-01 08:00:01", "B"),
        packet("2019-03-01 08:00:02", "C"),
    ]
    .join("");
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--filter", "A|C"], &input);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
}

#[test]
fn invalid_pattern_is_an_argument_error() {
    let (_stdout, stderr, code) = run_dmsieve_with_input(&["--filter", "("], "");
    assert_eq!(code, 1);
    assert!(stderr.contains("error [argument]"));
}

#[test]
fn malformed_xml_is_fatal_with_source_coordinates() {
    let input = format!(
        "{}\n<dm_log_packet><pair></dm_log_packet>",
        packet("2019-03-01 08:00:00", "OK")
    );
    let (_stdout, stderr, code) = run_dmsieve_with_file(&["--filter", ".*"], &input);
    assert_eq!(code, 1);
    assert!(stderr.contains("error [input]"), "stderr: {stderr}");
    assert!(stderr.contains("at line 2-2"), "stderr: {stderr}");
}

#[test]
fn packets_without_a_type_id_never_match_a_nonempty_pattern() {
    let input = "<dm_log_packet><pair key=\"timestamp\">2019-03-01 08:00:00</pair></dm_log_packet>";
    let (stdout, _stderr, code) = run_dmsieve_with_input(&["--filter", ".+"], input);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
}
