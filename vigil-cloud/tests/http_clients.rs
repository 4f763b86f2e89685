//! HTTP client behavior against a mock server

use serde_json::json;
use vigil_cloud::{HttpAlertSender, HttpChartGenerator, HttpExecutionService, HttpScheduleRegistry};
use vigil_core::{
    ExecutionType, OrganizationId, QuantitativeTestType, SchemaDeviation, SuiteId, SuiteKind,
    TestType,
};
use vigil_runtime::{
    AlertMessage, AlertSender, ChartGenerator, CollaboratorError, ExecuteRequest,
    ExecutionService, ScheduleRegistry, ScheduleUpdate, SchemaChangeAlert,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn execute_request() -> ExecuteRequest {
    ExecuteRequest {
        test_suite_id: SuiteId::new("S1"),
        test_type: TestType::Quantitative(QuantitativeTestType::MaterializationRowCount),
        target_org_id: OrganizationId::new("org-a"),
    }
}

fn schema_alert() -> AlertMessage {
    AlertMessage::SchemaChange(SchemaChangeAlert {
        alert_id: "alert-9".to_string(),
        test_type: TestType::Custom,
        name: "orders schema".to_string(),
        test_suite_id: SuiteId::new("S9"),
        target_resource_id: "db.public.orders".to_string(),
        deviations: vec![SchemaDeviation {
            field_name: "amount".to_string(),
            expected_type: Some("numeric".to_string()),
            actual_type: Some("text".to_string()),
        }],
        message: "The schema of orders changed.".to_string(),
    })
}

#[tokio::test]
async fn test_execute_posts_request_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tests/execute"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_json(json!({
            "testSuiteId": "S1",
            "testType": "MaterializationRowCount",
            "targetOrgId": "org-a"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpExecutionService::with_client(reqwest::Client::new(), server.uri());
    client.execute(&execute_request(), "token-1").await.unwrap();
}

#[tokio::test]
async fn test_execute_rejection_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tests/execute"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warehouse busy"))
        .mount(&server)
        .await;

    let client = HttpExecutionService::with_client(reqwest::Client::new(), server.uri());
    let err = client.execute(&execute_request(), "token-1").await.unwrap_err();
    match err {
        CollaboratorError::Rejected { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "warehouse busy");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let client = HttpExecutionService::with_client(reqwest::Client::new(), "http://127.0.0.1:1");
    let err = client.execute(&execute_request(), "t").await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Transport(_)));
}

#[tokio::test]
async fn test_chart_url_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/charts"))
        .and(body_json(json!({"testSuiteId": "S1", "targetOrgId": "org-a"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn.local/s1.png"})),
        )
        .mount(&server)
        .await;

    let client = HttpChartGenerator::with_client(reqwest::Client::new(), server.uri());
    let chart = client
        .generate_chart(&SuiteId::new("S1"), &OrganizationId::new("org-a"))
        .await
        .unwrap();
    assert_eq!(chart.url, "https://cdn.local/s1.png");
}

#[tokio::test]
async fn test_chart_with_unexpected_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/charts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = HttpChartGenerator::with_client(reqwest::Client::new(), server.uri());
    let err = client
        .generate_chart(&SuiteId::new("S1"), &OrganizationId::new("org-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::Decode(_)));
}

#[tokio::test]
async fn test_alert_is_posted_and_receipt_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alerts"))
        .and(header("authorization", "Bearer token-2"))
        .and(body_partial_json(json!({
            "targetOrgId": "org-a",
            "message": {"kind": "schema_change", "alertId": "alert-9"}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"delivered": true, "messageId": "m-1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpAlertSender::with_client(reqwest::Client::new(), server.uri());
    let receipt = client
        .send_alert(&schema_alert(), &OrganizationId::new("org-a"), "token-2")
        .await
        .unwrap();
    assert!(receipt.delivered);
    assert_eq!(receipt.message_id.as_deref(), Some("m-1"));
}

#[tokio::test]
async fn test_schedules_use_post_for_create_and_patch_for_update() {
    let server = MockServer::start().await;
    let expected = json!({
        "targetOrgId": "org-a",
        "kind": "qualitative_schema",
        "schedules": [{
            "cron": "*/5 * * * *",
            "executionType": "automatic",
            "testSuiteId": "S9",
            "toBeActivated": true
        }]
    });
    Mock::given(method("POST"))
        .and(path("/schedules"))
        .and(body_json(expected.clone()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/schedules"))
        .and(body_json(expected))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpScheduleRegistry::with_client(reqwest::Client::new(), server.uri());
    let schedules = vec![ScheduleUpdate {
        cron: "*/5 * * * *".to_string(),
        execution_type: ExecutionType::Automatic,
        test_suite_id: SuiteId::new("S9"),
        to_be_activated: true,
    }];
    let org = OrganizationId::new("org-a");
    registry
        .create_schedules(&org, SuiteKind::QualitativeSchema, &schedules, "jwt")
        .await
        .unwrap();
    registry
        .update_schedules(&org, SuiteKind::QualitativeSchema, &schedules, "jwt")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_schedule_batch_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let registry = HttpScheduleRegistry::with_client(reqwest::Client::new(), server.uri());
    registry
        .create_schedules(&OrganizationId::new("org-a"), SuiteKind::Quantitative, &[], "jwt")
        .await
        .unwrap();
}
