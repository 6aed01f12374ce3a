//! Integration tests for re-identification risk evaluation

use test_case::test_case;
use veil::deidentify::operator::generalize::bucket;
use veil::domain::Record;
use veil::risk::{Recommendation, RiskEvaluator};

fn people() -> Vec<Record> {
    [
        ("28045", 31),
        ("28045", 33),
        ("28046", 34),
        ("28047", 30),
        ("28012", 47),
        ("28013", 45),
        ("08001", 72),
        ("28045", 31),
    ]
    .iter()
    .map(|(zip, age)| Record::new().with("zip", *zip).with("age", *age as i64))
    .collect()
}

/// Coarsen zip to a prefix and age to a bucket
fn generalize(records: &[Record], prefix_len: usize, width: i64) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let zip = record
                .get("zip")
                .and_then(|v| v.as_text())
                .unwrap_or_default();
            let age = match record.get("age") {
                Some(veil::domain::FieldValue::Integer(age)) => *age,
                _ => panic!("age must be an integer"),
            };
            Record::new()
                .with("zip", zip.chars().take(prefix_len).collect::<String>())
                .with("age", bucket(age, width).unwrap().to_string())
        })
        .collect()
}

fn evaluator(k_min: usize) -> RiskEvaluator {
    RiskEvaluator::new(vec![vec!["zip".to_string(), "age".to_string()]], k_min).unwrap()
}

#[test_case(3, 5 ; "prefix 3 width 5")]
#[test_case(2, 10 ; "prefix 2 width 10")]
#[test_case(1, 50 ; "prefix 1 width 50")]
fn test_generalization_never_shrinks_classes(prefix_len: usize, width: i64) {
    let raw = people();
    let fine = evaluator(3).evaluate(&raw);
    let coarse = evaluator(3).evaluate(&generalize(&raw, prefix_len, width));

    for (before, after) in fine.records.iter().zip(&coarse.records) {
        assert_eq!(before.index, after.index);
        assert!(after.class_size >= before.class_size);
        assert!(after.score <= before.score);
    }
    assert!(coarse.achieved_k >= fine.achieved_k);
}

#[test]
fn test_unique_records_are_always_suppressed() {
    let report = evaluator(2).evaluate(&people());
    for risk in &report.records {
        if risk.class_size == 1 {
            assert_eq!(risk.recommendation, Recommendation::Suppress);
        }
    }
    // the duplicated ("28045", 31) pair meets k = 2
    assert_eq!(report.records[0].class_size, 2);
    assert_eq!(report.records[0].recommendation, Recommendation::Keep);
}

#[test]
fn test_overlapping_combinations_take_minimum_class() {
    let records: Vec<Record> = (0..6)
        .map(|i| {
            Record::new()
                .with("zip", "280")
                .with("age", if i == 0 { "70-74" } else { "30-34" })
                .with("sex", "F")
        })
        .collect();
    let evaluator = RiskEvaluator::new(
        vec![
            vec!["zip".to_string(), "sex".to_string()],
            vec!["zip".to_string(), "age".to_string()],
        ],
        3,
    )
    .unwrap();

    let report = evaluator.evaluate(&records);
    assert_eq!(report.records[0].class_size, 1);
    assert_eq!(report.records[1].class_size, 5);
    assert_eq!(report.combinations.len(), 2);
    assert_eq!(report.achieved_k, 1);
}

#[test]
fn test_empty_dataset_yields_empty_report() {
    let report = evaluator(5).evaluate(&[]);
    assert!(report.is_empty());
    assert_eq!(report.achieved_k, 0);
}

#[test]
fn test_report_renders_for_console_and_json() {
    let report = evaluator(2).evaluate(&people());
    let console = report.format_console();
    assert!(console.contains("RE-IDENTIFICATION RISK REPORT"));

    let json: serde_json::Value = serde_json::from_str(&report.format_json().unwrap()).unwrap();
    assert_eq!(json["k_min"], 2);
    assert_eq!(json["records"].as_array().unwrap().len(), 8);
}
