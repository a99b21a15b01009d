use std::io::Write;

use cfv_db::import::{parse_catalogue_csv, parse_flows_csv, parse_processes_json, parse_snapshot_csv};
use cfv_schemas::{differential_from_cost, Dimension, FlowKind, ProcessKind, TradeVarsPatch};
use chrono::NaiveDate;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn catalogue_derives_missing_differential() {
    let csv = "batch_id,cost,hedge,diff\nB1, 950, 400,\nB2,1000,410,12.5\n";
    let rows = parse_catalogue_csv(csv.as_bytes()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].diff, differential_from_cost(950.0, 400.0));
    assert_eq!(rows[1].diff, 12.5);
}

#[test]
fn catalogue_bad_number_reports_line() {
    let csv = "batch_id,cost,hedge\nB1,950,400\nB2,abc,410\n";
    let err = parse_catalogue_csv(csv.as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("line 3"), "{err:#}");
}

#[test]
fn flows_reject_negative_outbound_but_allow_signed_adjustment() {
    let csv = "fact_date,batch_id,grade,strategy,qty_kg\n2026-02-01,B5,AB,,-2\n";
    let adj = parse_flows_csv(csv.as_bytes(), FlowKind::Adjustment).unwrap();
    assert_eq!(adj[0].qty_kg, -2.0);
    assert_eq!(adj[0].grade.as_deref(), Some("AB"));
    assert_eq!(adj[0].strategy, None);

    assert!(parse_flows_csv(csv.as_bytes(), FlowKind::Outbound).is_err());
}

#[test]
fn processes_json_validates_rows() {
    let ok = r#"[{
        "process_number": "P1", "kind": "STANDARD", "process_date": "2026-01-05",
        "rows": [
            {"batch_id": "B1", "input_qty_kg": 1000, "strategy": "AA TOP"},
            {"batch_id": "B2", "output_qty_kg": 900, "strategy": "AB PLUS", "loss_gain_kg": -3}
        ]
    }]"#;
    let ps = parse_processes_json(ok.as_bytes()).unwrap();
    assert_eq!(ps[0].kind, ProcessKind::Standard);
    assert_eq!(ps[0].rows[1].loss_gain_kg, -3.0);
    assert_eq!(ps[0].rows[0].input, TradeVarsPatch::empty());

    let bad = r#"[{
        "process_number": "P2", "kind": "BULKING", "process_date": "2026-01-05",
        "rows": [{"batch_id": "B1"}]
    }]"#;
    let err = parse_processes_json(bad.as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("P2"));
}

#[test]
fn snapshot_rejects_duplicate_values() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "value,closing_qty\nAA,700\nAB,693").unwrap();
    let snap = cfv_db::read_snapshot_csv(f.path(), d("2026-02-01"), Dimension::Grade).unwrap();
    assert_eq!(snap.closing.len(), 2);
    assert_eq!(snap.closing["AB"], 693.0);

    let dup = "value,closing_qty\nAA,1\nAA,2\n";
    assert!(parse_snapshot_csv(dup.as_bytes(), d("2026-02-01"), Dimension::Grade).is_err());
}
