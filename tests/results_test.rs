//! Result recording for an issued quotation.

mod common;

use assert_matches::assert_matches;
use common::*;
use labdesk::{
    client::{FailurePoint, LabApi},
    errors::ServiceError,
    models::QuotationId,
    services::results::{self, RangeCheck, ResultEntry, RowStatus},
};
use rstest::rstest;

async fn issued_quotation(lab: &TestLab) -> QuotationId {
    let intake = lab.intake("Meera").await;
    let mut basket = lab.basket(&[PH, TURBIDITY, LEAD, IRON]).await;
    lab.services
        .lifecycle
        .submit_basket(&intake.order, &mut basket, &mut None)
        .await
        .expect("basket submits")
        .quotation_id
}

fn entry(parameter_id: i64, result: &str) -> ResultEntry {
    ResultEntry {
        parameter_id,
        result: result.to_string(),
        ..ResultEntry::default()
    }
}

#[tokio::test]
async fn rows_carry_catalog_details() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;
    let rows = lab.services.results.rows(quotation_id).await.unwrap();

    assert_eq!(rows.len(), 4);
    let ph = rows.iter().find(|r| r.parameter_id() == PH).unwrap();
    assert_eq!(ph.protocol_options, vec!["IS:3025 (Part 11)", "APHA 4500-H+ B"]);
    assert_eq!(ph.range_label(), "6.5 - 8.5");
    let lead = rows.iter().find(|r| r.parameter_id() == LEAD).unwrap();
    assert_eq!(lead.range_label(), "<= 0.01");
    assert_eq!(lead.unit.as_deref(), Some("mg/L"));
}

#[rstest]
#[case::standard_choice(Some("APHA 4500-H+ B"), None, "APHA 4500-H+ B", None)]
#[case::home_wins(Some("APHA 4500-H+ B"), Some("Internal SOP-4"), "Internal SOP-4", Some("Internal SOP-4"))]
#[case::home_without_choice(None, Some("Internal SOP-4"), "Internal SOP-4", Some("Internal SOP-4"))]
#[tokio::test]
async fn protocol_recorded_for_dual_method_parameter(
    #[case] protocol: Option<&str>,
    #[case] home: Option<&str>,
    #[case] expected_used: &str,
    #[case] expected_home: Option<&str>,
) {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;
    let mut ph = entry(PH, "7.1");
    ph.protocol = protocol.map(str::to_string);
    ph.home_protocol = home.map(str::to_string);

    let report = lab.services.results.submit(quotation_id, &[ph]).await.unwrap();
    assert!(report.all_saved());

    let stored = lab
        .api
        .order_parameters(quotation_id)
        .await
        .unwrap()
        .into_iter()
        .find(|op| op.parameter_id == PH)
        .unwrap();
    assert_eq!(stored.result.as_deref(), Some("7.1"));
    assert_eq!(stored.protocol_used.as_deref(), Some(expected_used));
    assert_eq!(stored.home_protocol.as_deref(), expected_home);
}

#[tokio::test]
async fn single_method_is_implied() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;
    lab.services
        .results
        .submit(quotation_id, &[entry(TURBIDITY, "1.2")])
        .await
        .unwrap();

    let stored = lab.api.order_parameters(quotation_id).await.unwrap();
    let turbidity = stored.iter().find(|op| op.parameter_id == TURBIDITY).unwrap();
    assert_eq!(turbidity.protocol_used.as_deref(), Some("IS:3025 (Part 10)"));
}

#[tokio::test]
async fn missing_choice_rejects_the_whole_batch() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;

    let err = lab
        .services
        .results
        .submit(quotation_id, &[entry(IRON, "0.1"), entry(PH, "7.0")])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let stored = lab.api.order_parameters(quotation_id).await.unwrap();
    assert!(stored.iter().all(|op| op.result.is_none()));
}

#[tokio::test]
async fn out_of_range_results_are_saved_and_flagged() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;

    let report = lab
        .services
        .results
        .submit(quotation_id, &[entry(LEAD, "0.05"), entry(IRON, "0.2"), entry(TURBIDITY, "")])
        .await
        .unwrap();

    assert!(report.all_saved());
    let flagged: Vec<_> = report.out_of_range().map(|r| (r.parameter_id, r.range)).collect();
    assert_eq!(flagged, vec![(LEAD, RangeCheck::Above)]);
    assert_eq!(report.pending, vec![TURBIDITY]);
    assert!(!lab.services.results.is_complete(quotation_id).await.unwrap());
}

#[tokio::test]
async fn one_failed_row_does_not_block_the_others() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;
    lab.api.fail_on(FailurePoint::UpdateResult(IRON)).await;

    let report = lab
        .services
        .results
        .submit(quotation_id, &[entry(IRON, "0.1"), entry(TURBIDITY, "2")])
        .await
        .unwrap();

    assert!(!report.all_saved());
    let iron = report.rows.iter().find(|r| r.parameter_id == IRON).unwrap();
    assert_matches!(iron.status, RowStatus::Failed { .. });
    let turbidity = report.rows.iter().find(|r| r.parameter_id == TURBIDITY).unwrap();
    assert_eq!(turbidity.status, RowStatus::Saved);
}

#[tokio::test]
async fn unknown_parameter_is_not_found() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;
    let err = lab
        .services
        .results
        .submit(quotation_id, &[entry(MOISTURE, "12")])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn export_skips_rows_without_results() {
    let lab = TestLab::new().await;
    let quotation_id = issued_quotation(&lab).await;
    lab.services
        .results
        .submit(quotation_id, &[entry(TURBIDITY, "1.5")])
        .await
        .unwrap();

    let rows = results::export_rows(&lab.services.results.rows(quotation_id).await.unwrap());
    let mut out = Vec::new();
    results::write_csv(&rows, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    // Rows still waiting for a result are left out.
    assert_eq!(lines, vec!["Parameter,Result,Unit,Protocol", "Turbidity,1.5,NTU,IS:3025 (Part 10)"]);
}
