//! Suite lifecycle: create, read, update and soft delete
//!
//! Batches are validated in full before anything is written, persisted in a
//! single repository call, and then registered with the scheduler once per
//! suite kind.

use crate::collaborators::{ScheduleRegistry, ScheduleUpdate};
use crate::context::{CallContext, Stores};
use crate::metrics::record_suite_operation;
use crate::{conceal, Error, OperationFailed, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use vigil_core::{
    resolve_organization, AuthContext, OrganizationId, SuiteId, SuiteKind, SuitePatch,
    SuiteProps, TestSuite,
};
use vigil_storage::SuiteFilter;

/// Create, read, update and delete suites
pub struct SuiteService {
    schedules: Arc<dyn ScheduleRegistry>,
}

impl SuiteService {
    pub fn new(schedules: Arc<dyn ScheduleRegistry>) -> Self {
        Self { schedules }
    }

    /// Validate and persist new suites, then register their schedules
    #[instrument(skip_all, fields(suite_count = props.len()))]
    pub async fn create(
        &self,
        auth: &AuthContext,
        target_org_id: Option<&str>,
        props: Vec<SuiteProps>,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<Vec<SuiteId>, OperationFailed> {
        let result = self
            .try_create(auth, target_org_id, props, stores, ctx)
            .await;
        record_suite_operation("create", result.is_ok());
        result.map_err(|err| conceal("create_suites", err))
    }

    /// Fetch one suite; soft-deleted suites read as absent
    #[instrument(skip_all, fields(test_suite_id = %id))]
    pub async fn read_one(
        &self,
        auth: &AuthContext,
        target_org_id: Option<&str>,
        id: &SuiteId,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<Option<TestSuite>, OperationFailed> {
        let result: Result<Option<TestSuite>> = async {
            let org = resolve_organization(auth, target_org_id, None)?;
            Ok(ctx
                .run("suite read", stores.suites.find_one(id, &org))
                .await?
                .filter(|s| !s.is_deleted()))
        }
        .await;
        result.map_err(|err| conceal("read_suite", err))
    }

    #[instrument(skip_all)]
    pub async fn read_many(
        &self,
        auth: &AuthContext,
        target_org_id: Option<&str>,
        filter: &SuiteFilter,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<Vec<TestSuite>, OperationFailed> {
        let result: Result<Vec<TestSuite>> = async {
            let org = resolve_organization(auth, target_org_id, None)?;
            ctx.run("suite query", stores.suites.find_by(filter, &org))
                .await
        }
        .await;
        result.map_err(|err| conceal("read_suites", err))
    }

    /// Apply partial updates; every patched suite is rebuilt and revalidated
    #[instrument(skip_all, fields(suite_count = patches.len()))]
    pub async fn update(
        &self,
        auth: &AuthContext,
        target_org_id: Option<&str>,
        patches: Vec<(SuiteId, SuitePatch)>,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<(), OperationFailed> {
        let result: Result<()> = async {
            let org = resolve_organization(auth, target_org_id, None)?;
            self.apply_patches(auth, &org, patches, stores, ctx).await
        }
        .await;
        record_suite_operation("update", result.is_ok());
        result.map_err(|err| conceal("update_suites", err))
    }

    /// Soft delete: stamp `deletedAt`, deactivate, and stop the schedules
    #[instrument(skip_all, fields(suite_count = ids.len()))]
    pub async fn delete(
        &self,
        auth: &AuthContext,
        target_org_id: Option<&str>,
        ids: &[SuiteId],
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<(), OperationFailed> {
        let result: Result<()> = async {
            let org = resolve_organization(auth, target_org_id, None)?;
            let patch = SuitePatch::soft_delete(ctx.now());
            let patches = ids.iter().map(|id| (id.clone(), patch.clone())).collect();
            self.apply_patches(auth, &org, patches, stores, ctx).await
        }
        .await;
        record_suite_operation("delete", result.is_ok());
        result.map_err(|err| conceal("delete_suites", err))
    }

    async fn try_create(
        &self,
        auth: &AuthContext,
        target_org_id: Option<&str>,
        props: Vec<SuiteProps>,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<Vec<SuiteId>> {
        let org = resolve_organization(auth, target_org_id, None)?;

        let suites = props
            .into_iter()
            .map(TestSuite::new)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut seen = HashSet::new();
        if let Some(dup) = suites.iter().find(|s| !seen.insert(s.id().clone())) {
            return Err(Error::Validation(format!(
                "duplicate suite id {} in batch",
                dup.id()
            )));
        }

        let ids = ctx
            .run("suite insert", stores.suites.insert_many(&suites, &org))
            .await?;

        for (kind, schedules) in schedules_by_kind(suites.iter()).into_values() {
            ctx.run(
                "schedule registration",
                self.schedules
                    .create_schedules(&org, kind, &schedules, &auth.jwt),
            )
            .await?;
        }

        info!(organization_id = %org, created = ids.len(), "Suites created");
        Ok(ids)
    }

    async fn apply_patches(
        &self,
        auth: &AuthContext,
        org: &OrganizationId,
        patches: Vec<(SuiteId, SuitePatch)>,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }
        let mut seen = HashSet::new();
        if let Some((dup, _)) = patches.iter().find(|(id, _)| !seen.insert(id.clone())) {
            return Err(Error::Validation(format!(
                "duplicate suite id {} in batch",
                dup
            )));
        }

        let filter = SuiteFilter::default()
            .ids(patches.iter().map(|(id, _)| id.clone()))
            .deleted(false);
        let existing: HashMap<SuiteId, TestSuite> = ctx
            .run("suite query", stores.suites.find_by(&filter, org))
            .await?
            .into_iter()
            .map(|s| (s.id().clone(), s))
            .collect();

        let mut updated = Vec::with_capacity(patches.len());
        let mut rescheduled = Vec::new();
        for (id, patch) in &patches {
            let suite = existing
                .get(id)
                .ok_or_else(|| Error::SuiteNotFound(id.to_string()))?;
            let next = suite.patched(patch)?;
            if patch.touches_schedule() || patch.deleted_at.is_some() {
                rescheduled.push(next.clone());
            }
            updated.push(next);
        }

        ctx.run("suite update", stores.suites.replace_many(&updated, org))
            .await?;

        for (kind, schedules) in schedules_by_kind(rescheduled.iter()).into_values() {
            ctx.run(
                "schedule update",
                self.schedules
                    .update_schedules(org, kind, &schedules, &auth.jwt),
            )
            .await?;
        }

        info!(organization_id = %org, updated = updated.len(), "Suites updated");
        Ok(())
    }
}

fn schedules_by_kind<'s>(
    suites: impl Iterator<Item = &'s TestSuite>,
) -> BTreeMap<&'static str, (SuiteKind, Vec<ScheduleUpdate>)> {
    let mut grouped: BTreeMap<&'static str, (SuiteKind, Vec<ScheduleUpdate>)> = BTreeMap::new();
    for suite in suites {
        grouped
            .entry(suite.kind().as_str())
            .or_insert_with(|| (suite.kind(), Vec::new()))
            .1
            .push(ScheduleUpdate::from(suite));
    }
    grouped
}
