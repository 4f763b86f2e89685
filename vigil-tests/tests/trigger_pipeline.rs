//! End-to-end behavior of the execution trigger

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vigil_core::{ExecutionType, SuiteCategory, SuiteId, SuiteKind};
use vigil_runtime::{
    CallContext, ExecutionTrigger, PipelineConfig, SkipReason, TriggerOutcome, TriggerRequest,
};
use vigil_tests::assertions::{assert_executed_once, assert_not_executed};
use vigil_tests::fixtures::{org, probe, suite};
use vigil_tests::{AuthContextBuilder, RecordingExecutionService, ScriptedWarehouse, TestStores};

fn request(id: &str, kind: SuiteKind, execution_type: Option<ExecutionType>) -> TriggerRequest {
    TriggerRequest {
        test_suite_id: SuiteId::new(id),
        kind,
        execution_type,
        target_org_id: Some(org::primary().to_string()),
    }
}

fn trigger_with(executor: &Arc<RecordingExecutionService>) -> ExecutionTrigger {
    ExecutionTrigger::new(executor.clone(), PipelineConfig::default())
}

#[tokio::test]
async fn test_automatic_schema_suite_runs_when_target_altered() {
    let stores = TestStores::new(ScriptedWarehouse::altered(true));
    stores
        .suites
        .seed(&org::primary(), suite::schema("S1", ExecutionType::Automatic));
    let executor = Arc::new(RecordingExecutionService::new());
    let auth = AuthContextBuilder::system().jwt("sys-jwt").build();

    let outcome = trigger_with(&executor)
        .trigger(
            &auth,
            &request("S1", SuiteKind::QualitativeSchema, Some(ExecutionType::Automatic)),
            stores.stores(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::Executed);
    assert_executed_once(&executor, "S1");
    assert_eq!(executor.jwts(), vec!["sys-jwt".to_string()]);
    assert_eq!(executor.requests()[0].target_org_id, org::primary());

    let probes = stores.warehouse.probes();
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].lookback_minutes, 5);
    assert_eq!(probes[0].materialization_name, "orders");
    assert_eq!(stores.history.lookups(), 0);
}

#[tokio::test]
async fn test_automatic_schema_suite_skips_unaltered_target() {
    let stores = TestStores::new(ScriptedWarehouse::altered(false));
    stores
        .suites
        .seed(&org::primary(), suite::schema("S1", ExecutionType::Automatic));
    let executor = Arc::new(RecordingExecutionService::new());

    let outcome = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::system().build(),
            &request("S1", SuiteKind::QualitativeSchema, Some(ExecutionType::Automatic)),
            stores.stores(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::Skipped(SkipReason::NotAltered));
    assert!(executor.requests().is_empty());
    assert_eq!(stores.warehouse.probes().len(), 1);
    assert_eq!(stores.history.lookups(), 0);
}

#[tokio::test]
async fn test_automatic_quantitative_suite_uses_time_since_last_run() {
    let now = Utc::now();
    let stores = TestStores::new(ScriptedWarehouse::altered(false));
    let id = SuiteId::new("S2");
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S2", ExecutionType::Automatic));
    stores.history.record_execution(
        &org::primary(),
        &id,
        SuiteCategory::Quantitative,
        now - ChronoDuration::minutes(12),
    );
    let executor = Arc::new(RecordingExecutionService::new());

    let outcome = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::system().build(),
            &request("S2", SuiteKind::Quantitative, Some(ExecutionType::Automatic)),
            stores.stores(),
            &CallContext::new().at(now),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::Skipped(SkipReason::NotAltered));
    assert_not_executed(&executor);
    assert_eq!(stores.warehouse.probes()[0].lookback_minutes, 12);
}

#[tokio::test]
async fn test_qualitative_frequency_suite_without_history_runs() {
    let stores = TestStores::new(ScriptedWarehouse::altered(false));
    stores
        .suites
        .seed(&org::primary(), suite::qualitative("S3", ExecutionType::Frequency));
    let executor = Arc::new(RecordingExecutionService::new());

    let outcome = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &request("S3", SuiteKind::Qualitative, Some(ExecutionType::Frequency)),
            stores.stores(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::Executed);
    assert_eq!(stores.history.lookups(), 1);
    assert!(stores.warehouse.probes().is_empty());
}

#[tokio::test]
async fn test_frequency_quantitative_suite_skips_staleness_check() {
    let stores = TestStores::new(ScriptedWarehouse::altered(false));
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S4", ExecutionType::Frequency));
    let executor = Arc::new(RecordingExecutionService::new());

    let outcome = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &request("S4", SuiteKind::Quantitative, None),
            stores.stores(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::Executed);
    assert_executed_once(&executor, "S4");
    assert!(stores.warehouse.probes().is_empty());
    assert_eq!(stores.history.lookups(), 0);
}

#[tokio::test]
async fn test_deactivated_suite_is_skipped() {
    let stores = TestStores::default();
    stores.suites.seed(
        &org::primary(),
        suite::deactivated(suite::quantitative_props("S5", ExecutionType::Frequency)),
    );
    let executor = Arc::new(RecordingExecutionService::new());

    let outcome = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &request("S5", SuiteKind::Quantitative, None),
            stores.stores(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TriggerOutcome::Skipped(SkipReason::Deactivated));
    assert_not_executed(&executor);
}

#[tokio::test]
async fn test_automatic_custom_suite_is_rejected() {
    let stores = TestStores::default();
    stores
        .suites
        .seed(&org::primary(), suite::custom("S6", ExecutionType::Automatic));
    let executor = Arc::new(RecordingExecutionService::new());

    let result = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::system().build(),
            &request("S6", SuiteKind::Custom, Some(ExecutionType::Automatic)),
            stores.stores(),
            &CallContext::new(),
        )
        .await;

    assert!(result.is_err());
    assert_not_executed(&executor);
    assert!(stores.warehouse.probes().is_empty());
}

#[tokio::test]
async fn test_routing_failure_happens_before_any_read() {
    let stores = TestStores::default();
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S7", ExecutionType::Frequency));
    let executor = Arc::new(RecordingExecutionService::new());
    let trigger = trigger_with(&executor);

    // System caller without a target organization
    let mut req = request("S7", SuiteKind::Quantitative, None);
    req.target_org_id = Some("   ".to_string());
    let result = trigger
        .trigger(
            &AuthContextBuilder::system().build(),
            &req,
            stores.stores(),
            &CallContext::new(),
        )
        .await;
    assert!(result.is_err());

    // Automatic run requested by a user without a target organization
    let mut req = request("S7", SuiteKind::Quantitative, Some(ExecutionType::Automatic));
    req.target_org_id = None;
    let result = trigger
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &req,
            stores.stores(),
            &CallContext::new(),
        )
        .await;
    assert!(result.is_err());

    assert_eq!(stores.suites.find_one_calls(), 0);
    assert_not_executed(&executor);
}

#[tokio::test]
async fn test_user_cannot_run_automatic_suite_as_frequency() {
    let now = Utc::now();
    let stores = TestStores::new(ScriptedWarehouse::altered(false));
    let id = SuiteId::new("S2");
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S2", ExecutionType::Automatic));
    stores.history.record_execution(
        &org::primary(),
        &id,
        SuiteCategory::Quantitative,
        now - ChronoDuration::minutes(30),
    );
    let executor = Arc::new(RecordingExecutionService::new());

    let mut req = request("S2", SuiteKind::Quantitative, Some(ExecutionType::Frequency));
    req.target_org_id = None;
    let result = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &req,
            stores.stores(),
            &CallContext::new().at(now),
        )
        .await;

    assert!(result.is_err());
    assert_not_executed(&executor);
    assert!(stores.warehouse.probes().is_empty());
    assert_eq!(stores.history.lookups(), 0);
}

#[tokio::test]
async fn test_missing_or_mismatched_suite_fails() {
    let stores = TestStores::default();
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S8", ExecutionType::Frequency));
    stores.suites.seed(
        &org::primary(),
        suite::deleted(
            suite::quantitative_props("S9", ExecutionType::Frequency),
            Utc::now(),
        ),
    );
    let executor = Arc::new(RecordingExecutionService::new());
    let trigger = trigger_with(&executor);
    let auth = AuthContextBuilder::user(&org::primary()).build();

    for req in [
        request("missing", SuiteKind::Quantitative, None),
        request("S8", SuiteKind::Custom, None),
        request("S9", SuiteKind::Quantitative, None),
    ] {
        let result = trigger
            .trigger(&auth, &req, stores.stores(), &CallContext::new())
            .await;
        assert!(result.is_err(), "{} should not trigger", req.test_suite_id);
    }

    // Suites of another organization are invisible
    let result = trigger
        .trigger(
            &AuthContextBuilder::user(&org::other()).build(),
            &request("S8", SuiteKind::Quantitative, None),
            stores.stores(),
            &CallContext::new(),
        )
        .await;
    assert!(result.is_err());
    assert_not_executed(&executor);
}

#[tokio::test]
async fn test_malformed_probe_answers_fail_the_trigger() {
    let cases = vec![
        ScriptedWarehouse::rows(vec![]),
        ScriptedWarehouse::rows(vec![probe::row(true), probe::row(false)]),
        ScriptedWarehouse::rows(vec![probe::row_with(json!("true"))]),
        ScriptedWarehouse::rows(vec![probe::row_with(json!(1))]),
        ScriptedWarehouse::failing("warehouse unreachable"),
    ];

    for warehouse in cases {
        let stores = TestStores::new(warehouse);
        stores
            .suites
            .seed(&org::primary(), suite::schema("S10", ExecutionType::Automatic));
        let executor = Arc::new(RecordingExecutionService::new());

        let result = trigger_with(&executor)
            .trigger(
                &AuthContextBuilder::system().build(),
                &request("S10", SuiteKind::QualitativeSchema, Some(ExecutionType::Automatic)),
                stores.stores(),
                &CallContext::new(),
            )
            .await;

        assert!(result.is_err());
        assert_not_executed(&executor);
    }
}

#[tokio::test]
async fn test_execution_service_rejection_fails_the_trigger() {
    let stores = TestStores::default();
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S11", ExecutionType::Frequency));
    let executor = Arc::new(RecordingExecutionService::rejecting(503));

    let result = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &request("S11", SuiteKind::Quantitative, None),
            stores.stores(),
            &CallContext::new(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(executor.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_execution_service_hits_deadline() {
    let stores = TestStores::default();
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S12", ExecutionType::Frequency));
    let executor = Arc::new(RecordingExecutionService::slow(Duration::from_secs(30)));

    let result = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &request("S12", SuiteKind::Quantitative, None),
            stores.stores(),
            &CallContext::new().with_timeout(Duration::from_secs(1)),
        )
        .await;

    assert!(result.is_err());
    assert_not_executed(&executor);
}

#[tokio::test]
async fn test_cancelled_call_does_no_io() {
    let stores = TestStores::default();
    stores
        .suites
        .seed(&org::primary(), suite::quantitative("S13", ExecutionType::Frequency));
    let executor = Arc::new(RecordingExecutionService::new());
    let token = CancellationToken::new();
    token.cancel();

    let result = trigger_with(&executor)
        .trigger(
            &AuthContextBuilder::user(&org::primary()).build(),
            &request("S13", SuiteKind::Quantitative, None),
            stores.stores(),
            &CallContext::new().with_cancellation(token),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(stores.suites.find_one_calls(), 0);
    assert_not_executed(&executor);
}
