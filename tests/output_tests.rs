use crypto_scan_rs::output::{write_csv, write_json};
use crypto_scan_rs::patterns::Language;
use crypto_scan_rs::types::{CodeFinding, TlsFinding};

fn sample_code_findings() -> Vec<CodeFinding> {
    vec![
        CodeFinding {
            file_path: "/repo/src/app.py".to_string(),
            language: Language::Python,
            pattern: r"\bimport\s+cryptography\b".to_string(),
            snippet: "import cryptography from os import path".to_string(),
        },
        CodeFinding {
            file_path: "/repo/web/login.js".to_string(),
            language: Language::Javascript,
            pattern: r"\bcrypto\.subtle\b".to_string(),
            snippet: "await crypto.subtle.digest('SHA-256', data)".to_string(),
        },
    ]
}

#[test]
fn code_findings_round_trip_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("code.json");
    let records = sample_code_findings();

    write_json(&path, &records).unwrap();
    let parsed: Vec<CodeFinding> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed, records);
}

#[test]
fn code_csv_has_header_and_language_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("code.csv");
    assert!(write_csv(&path, &sample_code_findings()).unwrap());

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next().unwrap(), "file_path,language,pattern,snippet");
    assert!(content.contains("python"));
    assert!(content.contains("javascript"));
}

#[test]
fn tls_csv_skipped_when_empty_but_json_written() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("tls.csv");
    let json_path = dir.path().join("tls.json");

    assert!(!write_csv::<TlsFinding>(&csv_path, &[]).unwrap());
    assert!(!csv_path.exists());

    write_json::<TlsFinding>(&json_path, &[]).unwrap();
    assert_eq!(std::fs::read_to_string(&json_path).unwrap().trim(), "[]");
}
