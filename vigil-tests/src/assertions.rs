//! Assertions over recorded side effects

use crate::mocks::{RecordingAlertSender, RecordingExecutionService};
use vigil_core::SuiteId;
use vigil_runtime::{AlertMessage, AnomalyAlert};

/// Assert exactly one execution was requested, for `suite_id`
pub fn assert_executed_once(executor: &RecordingExecutionService, suite_id: &str) {
    let requests = executor.requests();
    assert_eq!(
        requests.len(),
        1,
        "expected one execution request, got {:?}",
        requests
    );
    assert_eq!(requests[0].test_suite_id, SuiteId::new(suite_id));
}

pub fn assert_not_executed(executor: &RecordingExecutionService) {
    let requests = executor.requests();
    assert!(
        requests.is_empty(),
        "expected no execution request, got {:?}",
        requests
    );
}

pub fn assert_no_alert_sent(sender: &RecordingAlertSender) {
    let sent = sender.sent();
    assert!(sent.is_empty(), "expected no alert, got {:?}", sent);
}

/// Return the single anomaly alert sent, failing otherwise
pub fn single_anomaly_alert(sender: &RecordingAlertSender) -> AnomalyAlert {
    let sent = sender.sent();
    assert_eq!(sent.len(), 1, "expected one alert, got {:?}", sent);
    match &sent[0].0 {
        AlertMessage::Anomaly(alert) => alert.clone(),
        other => panic!("expected an anomaly alert, got {:?}", other),
    }
}
