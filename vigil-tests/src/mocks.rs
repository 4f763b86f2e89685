//! In-memory stores and recording collaborators
//!
//! Every fake keeps what it was asked to do so tests can assert on side
//! effects, and can be told to fail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vigil_core::{OrganizationId, SuiteCategory, SuiteId, SuiteKind, TestSuite};
use vigil_runtime::{
    AlertMessage, AlertSender, ChartGenerator, ChartImage, CollaboratorError, CollaboratorResult,
    DeliveryReceipt, ExecuteRequest, ExecutionService, ScheduleRegistry, ScheduleUpdate, Stores,
};
use vigil_storage::{
    Error as StorageError, ExecutionHistory, ProbeRow, Result as StorageResult, StalenessProbe,
    SuiteFilter, SuiteRepository, WarehouseProbe,
};

type SuiteKey = (String, SuiteId);

/// Suite repository backed by a map, counting calls per method
#[derive(Default)]
pub struct InMemorySuiteRepository {
    suites: Mutex<HashMap<SuiteKey, TestSuite>>,
    find_one_calls: AtomicUsize,
    find_by_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    replace_calls: AtomicUsize,
    fail_replace: AtomicBool,
}

impl InMemorySuiteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `suite` for `org` without going through the counters
    pub fn seed(&self, org: &OrganizationId, suite: TestSuite) {
        self.suites
            .lock()
            .expect("suite map poisoned")
            .insert((org.to_string(), suite.id().clone()), suite);
    }

    pub fn get(&self, org: &OrganizationId, id: &SuiteId) -> Option<TestSuite> {
        self.suites
            .lock()
            .expect("suite map poisoned")
            .get(&(org.to_string(), id.clone()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.suites.lock().expect("suite map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every later `replace_many` fail
    pub fn fail_replaces(&self) {
        self.fail_replace.store(true, Ordering::SeqCst);
    }

    pub fn find_one_calls(&self) -> usize {
        self.find_one_calls.load(Ordering::SeqCst)
    }

    pub fn find_by_calls(&self) -> usize {
        self.find_by_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuiteRepository for InMemorySuiteRepository {
    async fn find_one(&self, id: &SuiteId, org: &OrganizationId) -> StorageResult<Option<TestSuite>> {
        self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(org, id))
    }

    async fn find_by(
        &self,
        filter: &SuiteFilter,
        org: &OrganizationId,
    ) -> StorageResult<Vec<TestSuite>> {
        self.find_by_calls.fetch_add(1, Ordering::SeqCst);
        let suites = self.suites.lock().expect("suite map poisoned");
        let mut found: Vec<TestSuite> = suites
            .iter()
            .filter(|((owner, _), suite)| owner == org.as_str() && filter.matches(suite))
            .map(|(_, suite)| suite.clone())
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(found)
    }

    async fn insert_many(
        &self,
        suites: &[TestSuite],
        org: &OrganizationId,
    ) -> StorageResult<Vec<SuiteId>> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.suites.lock().expect("suite map poisoned");
        if let Some(existing) = suites
            .iter()
            .find(|s| stored.contains_key(&(org.to_string(), s.id().clone())))
        {
            return Err(StorageError::AlreadyExists(existing.id().to_string()));
        }
        for suite in suites {
            stored.insert((org.to_string(), suite.id().clone()), suite.clone());
        }
        Ok(suites.iter().map(|s| s.id().clone()).collect())
    }

    async fn replace_many(&self, suites: &[TestSuite], org: &OrganizationId) -> StorageResult<()> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("replace rejected".to_string()));
        }
        let mut stored = self.suites.lock().expect("suite map poisoned");
        for suite in suites {
            stored.insert((org.to_string(), suite.id().clone()), suite.clone());
        }
        Ok(())
    }
}

type HistoryKey = (String, SuiteId, SuiteCategory);
type AlertKey = (String, String);

/// Execution history with registrable executions and alerts
#[derive(Default)]
pub struct InMemoryHistory {
    executions: Mutex<HashMap<HistoryKey, DateTime<Utc>>>,
    /// Alert id to the recorded verdict, `None` until feedback arrives
    alerts: Mutex<HashMap<AlertKey, Option<bool>>>,
    lookups: AtomicUsize,
    feedback_writes: AtomicUsize,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution(
        &self,
        org: &OrganizationId,
        suite_id: &SuiteId,
        category: SuiteCategory,
        at: DateTime<Utc>,
    ) {
        self.executions
            .lock()
            .expect("history poisoned")
            .insert((org.to_string(), suite_id.clone(), category), at);
    }

    /// Register an execution row that raised `alert_id`
    pub fn register_alert(&self, org: &OrganizationId, alert_id: &str) {
        self.alerts
            .lock()
            .expect("history poisoned")
            .insert((org.to_string(), alert_id.to_string()), None);
    }

    pub fn feedback_for(&self, org: &OrganizationId, alert_id: &str) -> Option<bool> {
        self.alerts
            .lock()
            .expect("history poisoned")
            .get(&(org.to_string(), alert_id.to_string()))
            .copied()
            .flatten()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn feedback_writes(&self) -> usize {
        self.feedback_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionHistory for InMemoryHistory {
    async fn last_execution_at(
        &self,
        suite_id: &SuiteId,
        category: SuiteCategory,
        org: &OrganizationId,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .executions
            .lock()
            .expect("history poisoned")
            .get(&(org.to_string(), suite_id.clone(), category))
            .copied())
    }

    async fn record_feedback(
        &self,
        alert_id: &str,
        is_anomaly: bool,
        org: &OrganizationId,
    ) -> StorageResult<()> {
        self.feedback_writes.fetch_add(1, Ordering::SeqCst);
        let mut alerts = self.alerts.lock().expect("history poisoned");
        match alerts.get_mut(&(org.to_string(), alert_id.to_string())) {
            Some(verdict) => {
                *verdict = Some(is_anomaly);
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("alert {}", alert_id))),
        }
    }
}

#[derive(Debug, Clone)]
enum Script {
    Rows(Vec<ProbeRow>),
    Fail(String),
}

/// Warehouse probe returning scripted rows and recording every probe
pub struct ScriptedWarehouse {
    script: Script,
    probes: Mutex<Vec<StalenessProbe>>,
}

impl ScriptedWarehouse {
    /// One row with `was_altered` set to `altered`
    pub fn altered(altered: bool) -> Self {
        Self::rows(vec![crate::fixtures::probe::row(altered)])
    }

    pub fn rows(rows: Vec<ProbeRow>) -> Self {
        Self {
            script: Script::Rows(rows),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            script: Script::Fail(message.to_string()),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn probes(&self) -> Vec<StalenessProbe> {
        self.probes.lock().expect("probe log poisoned").clone()
    }
}

#[async_trait]
impl WarehouseProbe for ScriptedWarehouse {
    async fn query(&self, probe: &StalenessProbe) -> StorageResult<Vec<ProbeRow>> {
        self.probes
            .lock()
            .expect("probe log poisoned")
            .push(probe.clone());
        match &self.script {
            Script::Rows(rows) => Ok(rows.clone()),
            Script::Fail(message) => Err(StorageError::Internal(message.clone())),
        }
    }
}

/// The three stores a pipeline operation borrows
pub struct TestStores {
    pub suites: InMemorySuiteRepository,
    pub history: InMemoryHistory,
    pub warehouse: ScriptedWarehouse,
}

impl TestStores {
    pub fn new(warehouse: ScriptedWarehouse) -> Self {
        Self {
            suites: InMemorySuiteRepository::new(),
            history: InMemoryHistory::new(),
            warehouse,
        }
    }

    pub fn stores(&self) -> Stores<'_> {
        Stores {
            suites: &self.suites,
            history: &self.history,
            warehouse: &self.warehouse,
        }
    }
}

impl Default for TestStores {
    fn default() -> Self {
        Self::new(ScriptedWarehouse::altered(true))
    }
}

/// Execution service that records requests, optionally slow or failing
#[derive(Default)]
pub struct RecordingExecutionService {
    requests: Mutex<Vec<(ExecuteRequest, String)>>,
    delay: Option<Duration>,
    reject_with: Option<u16>,
}

impl RecordingExecutionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Answer every request with HTTP `status`
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ExecuteRequest> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn jwts(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .iter()
            .map(|(_, jwt)| jwt.clone())
            .collect()
    }
}

#[async_trait]
impl ExecutionService for RecordingExecutionService {
    async fn execute(&self, request: &ExecuteRequest, jwt: &str) -> CollaboratorResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests
            .lock()
            .expect("request log poisoned")
            .push((request.clone(), jwt.to_string()));
        match self.reject_with {
            Some(status) => Err(CollaboratorError::Rejected {
                status,
                body: "rejected by test".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Chart generator answering with a fixed URL
pub struct StaticChartGenerator {
    url: String,
    calls: AtomicUsize,
}

impl StaticChartGenerator {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartGenerator for StaticChartGenerator {
    async fn generate_chart(
        &self,
        _suite_id: &SuiteId,
        _org: &OrganizationId,
    ) -> CollaboratorResult<ChartImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChartImage {
            url: self.url.clone(),
        })
    }
}

/// Alert sender recording every message
pub struct RecordingAlertSender {
    sent: Mutex<Vec<(AlertMessage, OrganizationId)>>,
    delivered: bool,
}

impl RecordingAlertSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            delivered: true,
        }
    }

    /// Accept messages but report them as undelivered
    pub fn undelivering() -> Self {
        Self {
            delivered: false,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<(AlertMessage, OrganizationId)> {
        self.sent.lock().expect("alert log poisoned").clone()
    }
}

impl Default for RecordingAlertSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSender for RecordingAlertSender {
    async fn send_alert(
        &self,
        message: &AlertMessage,
        org: &OrganizationId,
        _jwt: &str,
    ) -> CollaboratorResult<DeliveryReceipt> {
        self.sent
            .lock()
            .expect("alert log poisoned")
            .push((message.clone(), org.clone()));
        Ok(DeliveryReceipt {
            delivered: self.delivered,
            message_id: self.delivered.then(|| format!("msg-{}", message.alert_id())),
        })
    }
}

/// One schedule registry call
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleCall {
    pub organization: OrganizationId,
    pub kind: SuiteKind,
    pub schedules: Vec<ScheduleUpdate>,
}

/// Schedule registry recording creates and updates separately
#[derive(Default)]
pub struct RecordingScheduleRegistry {
    created: Mutex<Vec<ScheduleCall>>,
    updated: Mutex<Vec<ScheduleCall>>,
}

impl RecordingScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<ScheduleCall> {
        self.created.lock().expect("schedule log poisoned").clone()
    }

    pub fn updated(&self) -> Vec<ScheduleCall> {
        self.updated.lock().expect("schedule log poisoned").clone()
    }
}

#[async_trait]
impl ScheduleRegistry for RecordingScheduleRegistry {
    async fn create_schedules(
        &self,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        _jwt: &str,
    ) -> CollaboratorResult<()> {
        self.created
            .lock()
            .expect("schedule log poisoned")
            .push(ScheduleCall {
                organization: org.clone(),
                kind,
                schedules: schedules.to_vec(),
            });
        Ok(())
    }

    async fn update_schedules(
        &self,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        _jwt: &str,
    ) -> CollaboratorResult<()> {
        self.updated
            .lock()
            .expect("schedule log poisoned")
            .push(ScheduleCall {
                organization: org.clone(),
                kind,
                schedules: schedules.to_vec(),
            });
        Ok(())
    }
}
