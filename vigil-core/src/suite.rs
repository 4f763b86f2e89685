//! Test suite definitions
//!
//! A test suite is a configured, schedulable check against a warehouse asset.
//! All four suite kinds share a single [`TestSuite`] type; the fields that
//! only some kinds carry live in [`SuiteSpec`].
//!
//! Suites are only built through [`TestSuite::new`]. Updates go through
//! [`TestSuite::patched`], which rebuilds the whole entity from its props so
//! the same invariants apply to every version of a suite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a test suite
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuiteId(String);

impl SuiteId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SuiteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SuiteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Errors raised while building or patching a suite
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SuiteError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown {kind} test type: {value}")]
    UnknownTestType { kind: &'static str, value: String },

    #[error("Column name is not allowed for materialization-level test type {0}")]
    ColumnNotAllowed(TestType),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// The four kinds of test suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteKind {
    Quantitative,
    Qualitative,
    QualitativeSchema,
    Custom,
}

impl SuiteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteKind::Quantitative => "quantitative",
            SuiteKind::Qualitative => "qualitative",
            SuiteKind::QualitativeSchema => "qualitative_schema",
            SuiteKind::Custom => "custom",
        }
    }

    /// History category the kind's executions are recorded under
    pub fn category(&self) -> SuiteCategory {
        match self {
            SuiteKind::Quantitative | SuiteKind::Custom => SuiteCategory::Quantitative,
            SuiteKind::Qualitative | SuiteKind::QualitativeSchema => SuiteCategory::Qualitative,
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteKind {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quantitative" => Ok(SuiteKind::Quantitative),
            "qualitative" => Ok(SuiteKind::Qualitative),
            "qualitative_schema" => Ok(SuiteKind::QualitativeSchema),
            "custom" => Ok(SuiteKind::Custom),
            other => Err(SuiteError::InvalidField {
                field: "kind",
                reason: format!("unknown suite kind '{}'", other),
            }),
        }
    }
}

/// Execution-history category, which decides where executions are recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteCategory {
    Quantitative,
    Qualitative,
}

impl SuiteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteCategory::Quantitative => "quantitative",
            SuiteCategory::Qualitative => "qualitative",
        }
    }
}

impl fmt::Display for SuiteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a suite's schedule decides whether to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Run opportunistically when the target changed
    Automatic,
    /// Run on every schedule firing regardless of change
    Frequency,
}

impl ExecutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionType::Automatic => "automatic",
            ExecutionType::Frequency => "frequency",
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionType {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" => Ok(ExecutionType::Automatic),
            "frequency" => Ok(ExecutionType::Frequency),
            other => Err(SuiteError::InvalidField {
                field: "executionType",
                reason: format!("unknown execution type '{}'", other),
            }),
        }
    }
}

/// Kind of warehouse object a suite targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterializationType {
    Table,
    View,
}

impl MaterializationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterializationType::Table => "Table",
            MaterializationType::View => "View",
        }
    }
}

impl FromStr for MaterializationType {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(MaterializationType::Table),
            "view" => Ok(MaterializationType::View),
            _ => Err(SuiteError::InvalidField {
                field: "materializationType",
                reason: format!("unknown materialization type '{}'", s),
            }),
        }
    }
}

/// Test types available to quantitative suites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantitativeTestType {
    MaterializationRowCount,
    MaterializationColumnCount,
    MaterializationFreshness,
    ColumnFreshness,
    ColumnCardinality,
    ColumnUniqueness,
    ColumnNullness,
    ColumnDistribution,
}

impl QuantitativeTestType {
    pub const ALL: [QuantitativeTestType; 8] = [
        QuantitativeTestType::MaterializationRowCount,
        QuantitativeTestType::MaterializationColumnCount,
        QuantitativeTestType::MaterializationFreshness,
        QuantitativeTestType::ColumnFreshness,
        QuantitativeTestType::ColumnCardinality,
        QuantitativeTestType::ColumnUniqueness,
        QuantitativeTestType::ColumnNullness,
        QuantitativeTestType::ColumnDistribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuantitativeTestType::MaterializationRowCount => "MaterializationRowCount",
            QuantitativeTestType::MaterializationColumnCount => "MaterializationColumnCount",
            QuantitativeTestType::MaterializationFreshness => "MaterializationFreshness",
            QuantitativeTestType::ColumnFreshness => "ColumnFreshness",
            QuantitativeTestType::ColumnCardinality => "ColumnCardinality",
            QuantitativeTestType::ColumnUniqueness => "ColumnUniqueness",
            QuantitativeTestType::ColumnNullness => "ColumnNullness",
            QuantitativeTestType::ColumnDistribution => "ColumnDistribution",
        }
    }

    /// Returns true if the test type inspects a single column
    pub fn is_column_level(&self) -> bool {
        !matches!(
            self,
            QuantitativeTestType::MaterializationRowCount
                | QuantitativeTestType::MaterializationColumnCount
                | QuantitativeTestType::MaterializationFreshness
        )
    }
}

impl FromStr for QuantitativeTestType {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SuiteError::UnknownTestType {
                kind: "quantitative",
                value: s.to_string(),
            })
    }
}

/// Test types available to qualitative suites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualitativeTestType {
    MaterializationSchemaChange,
}

impl QualitativeTestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualitativeTestType::MaterializationSchemaChange => "MaterializationSchemaChange",
        }
    }
}

impl FromStr for QualitativeTestType {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MaterializationSchemaChange" => Ok(QualitativeTestType::MaterializationSchemaChange),
            other => Err(SuiteError::UnknownTestType {
                kind: "qualitative",
                value: other.to_string(),
            }),
        }
    }
}

/// Any suite's test type, as sent to the execution service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TestType {
    Quantitative(QuantitativeTestType),
    Qualitative(QualitativeTestType),
    Custom,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Quantitative(t) => t.as_str(),
            TestType::Qualitative(t) => t.as_str(),
            TestType::Custom => "Custom",
        }
    }

    pub fn is_column_level(&self) -> bool {
        match self {
            TestType::Quantitative(t) => t.is_column_level(),
            TestType::Qualitative(_) | TestType::Custom => false,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Custom" {
            return Ok(TestType::Custom);
        }
        if let Ok(t) = s.parse::<QuantitativeTestType>() {
            return Ok(TestType::Quantitative(t));
        }
        s.parse::<QualitativeTestType>()
            .map(TestType::Qualitative)
            .map_err(|_| SuiteError::UnknownTestType {
                kind: "any",
                value: s.to_string(),
            })
    }
}

impl From<TestType> for String {
    fn from(t: TestType) -> Self {
        t.as_str().to_string()
    }
}

impl TryFrom<String> for TestType {
    type Error = SuiteError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Warehouse coordinates of the object under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub database_name: String,
    pub schema_name: String,
    pub materialization_name: String,
    pub materialization_type: MaterializationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
}

impl Target {
    /// Create a materialization-level target
    pub fn materialization(
        database_name: impl Into<String>,
        schema_name: impl Into<String>,
        materialization_name: impl Into<String>,
        materialization_type: MaterializationType,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            schema_name: schema_name.into(),
            materialization_name: materialization_name.into(),
            materialization_type,
            column_name: None,
        }
    }

    /// Narrow the target to a single column
    pub fn with_column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    /// `database.schema.materialization[.column]`
    pub fn qualified_name(&self) -> String {
        let mut name = format!(
            "{}.{}.{}",
            self.database_name, self.schema_name, self.materialization_name
        );
        if let Some(column) = &self.column_name {
            name.push('.');
            name.push_str(column);
        }
        name
    }

    fn validate(&self, test_type: TestType) -> Result<(), SuiteError> {
        require_non_empty(&self.database_name, "target.databaseName")?;
        require_non_empty(&self.schema_name, "target.schemaName")?;
        require_non_empty(&self.materialization_name, "target.materializationName")?;
        if self.column_name.is_some() && !test_type.is_column_level() {
            return Err(SuiteError::ColumnNotAllowed(test_type));
        }
        Ok(())
    }
}

/// Interpretation of user-defined custom thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    Absolute,
    Relative,
}

impl ThresholdMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdMode::Absolute => "absolute",
            ThresholdMode::Relative => "relative",
        }
    }
}

impl FromStr for ThresholdMode {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(ThresholdMode::Absolute),
            "relative" => Ok(ThresholdMode::Relative),
            other => Err(SuiteError::InvalidField {
                field: "customThresholdMode",
                reason: format!("unknown threshold mode '{}'", other),
            }),
        }
    }
}

/// Which expected bound an anomalous value crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdSide {
    Upper,
    Lower,
}

impl ThresholdSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdSide::Upper => "upper",
            ThresholdSide::Lower => "lower",
        }
    }
}

impl fmt::Display for ThresholdSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdSide {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upper" => Ok(ThresholdSide::Upper),
            "lower" => Ok(ThresholdSide::Lower),
            other => Err(SuiteError::InvalidField {
                field: "thresholdType",
                reason: format!("unknown threshold side '{}'", other),
            }),
        }
    }
}

/// User-defined bounds overriding the model's expected range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomThresholds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub mode: ThresholdMode,
}

/// Anomaly thresholds shared by quantitative and custom suites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// Legacy numeric bound
    pub threshold: f64,
    pub importance_threshold: f64,
    pub bounds_interval_relative: f64,
    #[serde(default)]
    pub custom: Option<CustomThresholds>,
    /// Bounds widened by false-positive feedback
    #[serde(default)]
    pub feedback_lower_threshold: Option<f64>,
    #[serde(default)]
    pub feedback_upper_threshold: Option<f64>,
}

impl Thresholds {
    pub fn new(threshold: f64, importance_threshold: f64, bounds_interval_relative: f64) -> Self {
        Self {
            threshold,
            importance_threshold,
            bounds_interval_relative,
            custom: None,
            feedback_lower_threshold: None,
            feedback_upper_threshold: None,
        }
    }

    fn validate(&self) -> Result<(), SuiteError> {
        for (field, value) in [
            ("threshold", self.threshold),
            ("importanceThreshold", self.importance_threshold),
            ("boundsIntervalRelative", self.bounds_interval_relative),
        ] {
            if !value.is_finite() {
                return Err(SuiteError::InvalidField {
                    field,
                    reason: "must be a finite number".to_string(),
                });
            }
        }
        if let Some(CustomThresholds {
            lower: Some(lower),
            upper: Some(upper),
            ..
        }) = self.custom
        {
            if lower > upper {
                return Err(SuiteError::InvalidField {
                    field: "customLowerThreshold",
                    reason: format!("{} is greater than upper threshold {}", lower, upper),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitativeSpec {
    pub test_type: QuantitativeTestType,
    pub target: Target,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub last_alert_sent: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitativeSpec {
    pub test_type: QualitativeTestType,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSpec {
    pub name: String,
    pub description: String,
    pub sql_logic: String,
    /// Custom tests may span several assets
    pub target_resource_ids: Vec<String>,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub last_alert_sent: Option<DateTime<Utc>>,
}

/// Kind-specific part of a suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuiteSpec {
    Quantitative(QuantitativeSpec),
    Qualitative(QualitativeSpec),
    QualitativeSchema(QualitativeSpec),
    Custom(CustomSpec),
}

impl SuiteSpec {
    pub fn kind(&self) -> SuiteKind {
        match self {
            SuiteSpec::Quantitative(_) => SuiteKind::Quantitative,
            SuiteSpec::Qualitative(_) => SuiteKind::Qualitative,
            SuiteSpec::QualitativeSchema(_) => SuiteKind::QualitativeSchema,
            SuiteSpec::Custom(_) => SuiteKind::Custom,
        }
    }

    pub fn test_type(&self) -> TestType {
        match self {
            SuiteSpec::Quantitative(spec) => TestType::Quantitative(spec.test_type),
            SuiteSpec::Qualitative(spec) | SuiteSpec::QualitativeSchema(spec) => {
                TestType::Qualitative(spec.test_type)
            }
            SuiteSpec::Custom(_) => TestType::Custom,
        }
    }

    fn validate(&self) -> Result<(), SuiteError> {
        let test_type = self.test_type();
        match self {
            SuiteSpec::Quantitative(spec) => {
                spec.target.validate(test_type)?;
                spec.thresholds.validate()
            }
            SuiteSpec::Qualitative(spec) | SuiteSpec::QualitativeSchema(spec) => {
                spec.target.validate(test_type)
            }
            SuiteSpec::Custom(spec) => {
                require_non_empty(&spec.name, "name")?;
                require_non_empty(&spec.description, "description")?;
                require_non_empty(&spec.sql_logic, "sqlLogic")?;
                spec.thresholds.validate()
            }
        }
    }
}

/// Unvalidated suite fields, the input to [`TestSuite::new`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteProps {
    pub id: String,
    pub activated: bool,
    pub cron: String,
    pub execution_type: Option<ExecutionType>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub spec: SuiteSpec,
}

/// A validated test suite
///
/// Serialization goes through [`SuiteProps`], so deserializing a suite runs
/// the same validation as constructing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SuiteProps", into = "SuiteProps")]
pub struct TestSuite {
    id: SuiteId,
    activated: bool,
    cron: String,
    execution_type: ExecutionType,
    deleted_at: Option<DateTime<Utc>>,
    spec: SuiteSpec,
}

impl TestSuite {
    /// Build a suite, rejecting any props that violate a suite invariant
    pub fn new(props: SuiteProps) -> Result<Self, SuiteError> {
        require_non_empty(&props.id, "id")?;
        require_non_empty(&props.cron, "cron")?;
        let execution_type = props
            .execution_type
            .ok_or(SuiteError::MissingField("executionType"))?;
        props.spec.validate()?;

        Ok(Self {
            id: SuiteId::new(props.id),
            activated: props.activated,
            cron: props.cron,
            execution_type,
            deleted_at: props.deleted_at,
            spec: props.spec,
        })
    }

    pub fn id(&self) -> &SuiteId {
        &self.id
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn spec(&self) -> &SuiteSpec {
        &self.spec
    }

    pub fn kind(&self) -> SuiteKind {
        self.spec.kind()
    }

    pub fn test_type(&self) -> TestType {
        self.spec.test_type()
    }

    /// Warehouse target, absent for custom suites
    pub fn target(&self) -> Option<&Target> {
        match &self.spec {
            SuiteSpec::Quantitative(spec) => Some(&spec.target),
            SuiteSpec::Qualitative(spec) | SuiteSpec::QualitativeSchema(spec) => Some(&spec.target),
            SuiteSpec::Custom(_) => None,
        }
    }

    pub fn thresholds(&self) -> Option<&Thresholds> {
        match &self.spec {
            SuiteSpec::Quantitative(spec) => Some(&spec.thresholds),
            SuiteSpec::Custom(spec) => Some(&spec.thresholds),
            SuiteSpec::Qualitative(_) | SuiteSpec::QualitativeSchema(_) => None,
        }
    }

    pub fn last_alert_sent(&self) -> Option<DateTime<Utc>> {
        match &self.spec {
            SuiteSpec::Quantitative(spec) => spec.last_alert_sent,
            SuiteSpec::Custom(spec) => spec.last_alert_sent,
            SuiteSpec::Qualitative(_) | SuiteSpec::QualitativeSchema(_) => None,
        }
    }

    /// Resource ids the suite reports against
    pub fn target_resource_ids(&self) -> Vec<String> {
        match &self.spec {
            SuiteSpec::Custom(spec) => spec.target_resource_ids.clone(),
            _ => self
                .target()
                .map(|t| vec![t.qualified_name()])
                .unwrap_or_default(),
        }
    }

    /// Human-readable name used in alert text
    pub fn display_name(&self) -> String {
        match (&self.spec, self.target()) {
            (SuiteSpec::Custom(spec), _) => spec.name.clone(),
            (_, Some(target)) => format!("{} on {}", self.test_type(), target.qualified_name()),
            (_, None) => self.test_type().to_string(),
        }
    }

    pub fn into_props(self) -> SuiteProps {
        SuiteProps {
            id: self.id.0,
            activated: self.activated,
            cron: self.cron,
            execution_type: Some(self.execution_type),
            deleted_at: self.deleted_at,
            spec: self.spec,
        }
    }

    /// Apply a partial update by rebuilding the suite through [`TestSuite::new`]
    pub fn patched(&self, patch: &SuitePatch) -> Result<Self, SuiteError> {
        let mut props = self.clone().into_props();
        patch.apply(&mut props)?;
        Self::new(props)
    }
}

impl TryFrom<SuiteProps> for TestSuite {
    type Error = SuiteError;

    fn try_from(props: SuiteProps) -> Result<Self, Self::Error> {
        Self::new(props)
    }
}

impl From<TestSuite> for SuiteProps {
    fn from(suite: TestSuite) -> Self {
        suite.into_props()
    }
}

/// Partial update of a suite
///
/// Only fields that are `Some` are applied. Threshold-related fields are
/// rejected for qualitative suites, which carry no thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuitePatch {
    pub activated: Option<bool>,
    pub cron: Option<String>,
    pub execution_type: Option<ExecutionType>,
    pub threshold: Option<f64>,
    pub importance_threshold: Option<f64>,
    pub bounds_interval_relative: Option<f64>,
    pub custom_thresholds: Option<CustomThresholds>,
    pub feedback_lower_threshold: Option<f64>,
    pub feedback_upper_threshold: Option<f64>,
    pub last_alert_sent: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sql_logic: Option<String>,
    pub target_resource_ids: Option<Vec<String>>,
}

impl SuitePatch {
    /// Patch that moves the feedback threshold on `side` to `value`
    pub fn feedback_threshold(side: ThresholdSide, value: f64) -> Self {
        match side {
            ThresholdSide::Upper => Self {
                feedback_upper_threshold: Some(value),
                ..Self::default()
            },
            ThresholdSide::Lower => Self {
                feedback_lower_threshold: Some(value),
                ..Self::default()
            },
        }
    }

    /// Patch recording that an alert went out at `at`
    pub fn alert_sent(at: DateTime<Utc>) -> Self {
        Self {
            last_alert_sent: Some(at),
            ..Self::default()
        }
    }

    /// Patch soft-deleting a suite; deleted suites are also deactivated
    pub fn soft_delete(at: DateTime<Utc>) -> Self {
        Self {
            activated: Some(false),
            deleted_at: Some(at),
            ..Self::default()
        }
    }

    /// Returns true if applying the patch changes what the scheduler needs to know
    pub fn touches_schedule(&self) -> bool {
        self.activated.is_some() || self.cron.is_some() || self.execution_type.is_some()
    }

    fn touches_thresholds(&self) -> bool {
        self.threshold.is_some()
            || self.importance_threshold.is_some()
            || self.bounds_interval_relative.is_some()
            || self.custom_thresholds.is_some()
            || self.feedback_lower_threshold.is_some()
            || self.feedback_upper_threshold.is_some()
            || self.last_alert_sent.is_some()
    }

    fn touches_custom_fields(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.sql_logic.is_some()
            || self.target_resource_ids.is_some()
    }

    fn apply(&self, props: &mut SuiteProps) -> Result<(), SuiteError> {
        if let Some(activated) = self.activated {
            props.activated = activated;
        }
        if let Some(cron) = &self.cron {
            props.cron = cron.clone();
        }
        if let Some(execution_type) = self.execution_type {
            props.execution_type = Some(execution_type);
        }
        if let Some(deleted_at) = self.deleted_at {
            props.deleted_at = Some(deleted_at);
        }

        let kind = props.spec.kind();
        match &mut props.spec {
            SuiteSpec::Quantitative(spec) => {
                if self.touches_custom_fields() {
                    return Err(not_applicable("name", kind));
                }
                self.apply_thresholds(&mut spec.thresholds, &mut spec.last_alert_sent);
            }
            SuiteSpec::Custom(spec) => {
                if let Some(name) = &self.name {
                    spec.name = name.clone();
                }
                if let Some(description) = &self.description {
                    spec.description = description.clone();
                }
                if let Some(sql_logic) = &self.sql_logic {
                    spec.sql_logic = sql_logic.clone();
                }
                if let Some(ids) = &self.target_resource_ids {
                    spec.target_resource_ids = ids.clone();
                }
                self.apply_thresholds(&mut spec.thresholds, &mut spec.last_alert_sent);
            }
            SuiteSpec::Qualitative(_) | SuiteSpec::QualitativeSchema(_) => {
                if self.touches_thresholds() {
                    return Err(not_applicable("threshold", kind));
                }
                if self.touches_custom_fields() {
                    return Err(not_applicable("name", kind));
                }
            }
        }
        Ok(())
    }

    fn apply_thresholds(
        &self,
        thresholds: &mut Thresholds,
        last_alert_sent: &mut Option<DateTime<Utc>>,
    ) {
        if let Some(v) = self.threshold {
            thresholds.threshold = v;
        }
        if let Some(v) = self.importance_threshold {
            thresholds.importance_threshold = v;
        }
        if let Some(v) = self.bounds_interval_relative {
            thresholds.bounds_interval_relative = v;
        }
        if let Some(custom) = self.custom_thresholds {
            thresholds.custom = Some(custom);
        }
        if let Some(v) = self.feedback_lower_threshold {
            thresholds.feedback_lower_threshold = Some(v);
        }
        if let Some(v) = self.feedback_upper_threshold {
            thresholds.feedback_upper_threshold = Some(v);
        }
        if let Some(at) = self.last_alert_sent {
            *last_alert_sent = Some(at);
        }
    }
}

fn not_applicable(field: &'static str, kind: SuiteKind) -> SuiteError {
    SuiteError::InvalidField {
        field,
        reason: format!("not applicable to {} suites", kind),
    }
}

fn require_non_empty(value: &str, field: &'static str) -> Result<(), SuiteError> {
    if value.trim().is_empty() {
        return Err(SuiteError::MissingField(field));
    }
    Ok(())
}
