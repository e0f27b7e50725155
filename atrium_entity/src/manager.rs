//! The entity manager: the CRUD pipeline bound to one kind.
//!
//! Every operation runs validation, consults the permission engine,
//! dispatches before/after hooks, and persists inside a session. When
//! the manager was built with a caller-supplied session handle it joins
//! that transaction and leaves commit to the outermost owner; otherwise
//! each operation owns its session and commits or rolls back itself.

use atrium_core::error::{EntityError, Error, PermissionError, Result};
use atrium_core::id::{RecordId, TeamId, UserId};
use atrium_core::types::{AccessLevel, FieldType, KindDescriptor, SystemPrincipals};
use atrium_permission::{Decision, DenialReason, PermissionEngine};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::hooks::HookRegistry;
use crate::record::{Draft, EntityRecord, Patch};
use crate::registry::{KindRegistry, PipelineResolver};
use crate::search::{record_matches, resolve_clauses, SearchTransformer, SearchTransformers};
use crate::store::{EntityStore, SessionHandle};

/// How batch operations report per-item failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchErrorMode {
    /// Return the outcome with successes and an error list.
    PartialSuccess,
    /// Fail the call with an aggregate error when any item failed.
    /// Per-item successes stay committed either way.
    #[default]
    Aggregate,
}

/// Result of a batch operation.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Records the batch touched successfully.
    pub succeeded: Vec<EntityRecord>,
    /// Per-item failures, keyed by the item identifier.
    pub errors: Vec<(String, String)>,
}

/// A record plus its eagerly hydrated relations.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    /// The record, projected when a field whitelist was given.
    pub record: EntityRecord,
    /// Included relations, keyed by relation name.
    pub included: BTreeMap<String, Vec<EntityRecord>>,
}

/// A synchronous draft validator attached to a manager.
pub type Validator = Arc<dyn Fn(&Draft) -> Result<()> + Send + Sync>;

/// Options for `get`.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Relations to hydrate.
    pub include: Vec<String>,
    /// Field whitelist; empty means every field.
    pub fields: Vec<String>,
    /// Return the tombstone instead of not-found; root only.
    pub include_deleted: bool,
}

/// Options for `list` and `search`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Exact-match filters on declared fields.
    pub filters: HashMap<String, Value>,
    /// Sort field; defaults to `created_at` descending.
    pub sort_by: Option<String>,
    /// Ascending order when a sort field is given.
    pub ascending: bool,
    /// Page size.
    pub limit: Option<usize>,
    /// Page offset.
    pub offset: Option<usize>,
    /// Relations to hydrate.
    pub include: Vec<String>,
    /// Field whitelist; empty means every field.
    pub fields: Vec<String>,
    /// Include tombstones; root only.
    pub include_deleted: bool,
}

/// Shared services every manager operates against.
#[derive(Clone)]
pub struct ManagerContext {
    /// The permission engine.
    pub engine: Arc<PermissionEngine>,
    /// Record storage.
    pub store: Arc<dyn EntityStore>,
    /// The process-wide hook registry.
    pub hooks: Arc<HookRegistry>,
    /// The kind registry.
    pub kinds: Arc<KindRegistry>,
}

impl ManagerContext {
    /// Build the resolver the permission engine reads records through.
    pub fn resolver(&self) -> PipelineResolver {
        PipelineResolver::new(self.store.clone(), self.kinds.clone())
    }

    fn system(&self) -> &SystemPrincipals {
        self.engine.system_principals()
    }
}

/// The pipeline instance responsible for one entity kind, acting as one
/// requester.
pub struct Manager {
    descriptor: KindDescriptor,
    ctx: ManagerContext,
    requester: UserId,
    target_user: UserId,
    target_team: Option<TeamId>,
    validators: Vec<Validator>,
    transformers: SearchTransformers,
    batch_mode: BatchErrorMode,
    batch_concurrency: usize,
    updated_at_guard: bool,
    session: Option<SessionHandle>,
}

impl Manager {
    /// Create a manager for `descriptor` acting as `requester`.
    ///
    /// The requester must be a known principal or one of the three
    /// distinguished identities.
    pub fn new(
        descriptor: KindDescriptor,
        ctx: ManagerContext,
        requester: UserId,
    ) -> Result<Self> {
        if !ctx.system().is_distinguished(requester)
            && ctx.engine.directory().principal(requester).is_none()
        {
            return Err(
                PermissionError::Denied(format!("unknown requester {}", requester)).into(),
            );
        }
        Ok(Self {
            descriptor,
            ctx,
            requester,
            target_user: requester,
            target_team: None,
            validators: Vec::new(),
            transformers: SearchTransformers::new(),
            batch_mode: BatchErrorMode::default(),
            batch_concurrency: 1,
            updated_at_guard: false,
            session: None,
        })
    }

    /// Act on behalf of another user; new records default to this owner
    /// and the same permission rules apply to the requester.
    pub fn target_user(mut self, user_id: UserId) -> Self {
        self.target_user = user_id;
        self
    }

    /// Act within a team; new team-owned records default to it.
    pub fn target_team(mut self, team_id: TeamId) -> Self {
        self.target_team = Some(team_id);
        self
    }

    /// Join a caller-supplied session; commit stays with the caller.
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach a draft validator.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Register a search transformer.
    pub fn with_transformer(mut self, name: impl Into<String>, t: SearchTransformer) -> Self {
        self.transformers.register(name, t);
        self
    }

    /// Choose how batch operations report failures.
    pub fn with_batch_mode(mut self, mode: BatchErrorMode) -> Self {
        self.batch_mode = mode;
        self
    }

    /// Fan batch items out concurrently, at most `limit` in flight.
    /// Items remain individually transactional.
    pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }

    /// Reject updates whose `expected_updated_at` does not match the
    /// record (optimistic concurrency).
    pub fn with_updated_at_guard(mut self) -> Self {
        self.updated_at_guard = true;
        self
    }

    /// The kind this manager serves.
    pub fn kind(&self) -> &str {
        &self.descriptor.kind
    }

    /// The descriptor this manager serves.
    pub fn descriptor(&self) -> &KindDescriptor {
        &self.descriptor
    }

    fn is_root(&self) -> bool {
        self.ctx.system().is_root(self.requester)
    }

    /// The session for one operation: the joined handle, or a fresh
    /// owned one. Returns `(handle, owned)`.
    fn obtain_session(&self) -> (SessionHandle, bool) {
        match &self.session {
            Some(handle) => (handle.clone(), false),
            None => (SessionHandle::new(self.ctx.store.as_ref()), true),
        }
    }

    /// Commit an owned session; a joined session commits with its owner.
    fn finish(&self, handle: SessionHandle, owned: bool) -> Result<()> {
        if owned {
            handle.commit()?;
        }
        Ok(())
    }

    /// Map a denial to the outward error: not-found when the requester
    /// cannot even see the record, permission-denied otherwise.
    fn denial_error(&self, id: RecordId, reason: DenialReason) -> Error {
        let resolver = self.ctx.resolver();
        let visible = self
            .ctx
            .engine
            .check(self.requester, self.kind(), id, AccessLevel::View, &resolver)
            .is_granted();
        if visible {
            PermissionError::Denied(reason.to_string()).into()
        } else {
            EntityError::NotFound {
                kind: self.kind().to_string(),
                id,
            }
            .into()
        }
    }

    /// Require `level` on a record, with the obscuring error mapping.
    fn require_level(&self, id: RecordId, level: AccessLevel) -> Result<()> {
        let resolver = self.ctx.resolver();
        match self
            .ctx
            .engine
            .check(self.requester, self.kind(), id, level, &resolver)
        {
            Decision::Granted => Ok(()),
            Decision::Denied(reason) => Err(self.denial_error(id, reason)),
        }
    }

    // ---- validation -----------------------------------------------------

    fn check_value_type(&self, name: &str, value: &Value, field_type: FieldType) -> Result<()> {
        let ok = match field_type {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => matches!(value, Value::String(s)
                if s.parse::<chrono::DateTime<Utc>>().is_ok()
                    || s.parse::<chrono::NaiveDate>().is_ok()),
            FieldType::Reference => {
                matches!(value, Value::String(s) if RecordId::from_str(s).is_ok())
            }
        };
        if ok {
            Ok(())
        } else {
            Err(EntityError::Validation(format!(
                "field '{}' of {} has the wrong type",
                name,
                self.kind()
            ))
            .into())
        }
    }

    fn validate_attributes(&self, attributes: &serde_json::Map<String, Value>) -> Result<()> {
        for (name, value) in attributes {
            if value.is_null() {
                continue;
            }
            if let Some(field) = self.descriptor.field(name) {
                self.check_value_type(name, value, field.field_type)?;
                continue;
            }
            if let Some(reference) = self
                .descriptor
                .permission_references
                .iter()
                .find(|r| r.id_field() == *name)
            {
                self.check_value_type(&reference.id_field(), value, FieldType::Reference)?;
                continue;
            }
            return Err(EntityError::UnknownField {
                kind: self.kind().to_string(),
                field: name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn validate_draft(&self, draft: &Draft) -> Result<()> {
        self.validate_attributes(&draft.attributes)?;
        for field in &self.descriptor.fields {
            if field.required
                && draft
                    .attributes
                    .get(&field.name)
                    .map_or(true, Value::is_null)
            {
                return Err(EntityError::Validation(format!(
                    "field '{}' of {} is required",
                    field.name,
                    self.kind()
                ))
                .into());
            }
        }
        if draft.user_id.is_some() && !self.descriptor.traits.user_owned {
            return Err(EntityError::Validation(format!(
                "{} records have no direct owner",
                self.kind()
            ))
            .into());
        }
        if draft.team_id.is_some() && !self.descriptor.traits.team_owned {
            return Err(EntityError::Validation(format!(
                "{} records have no team owner",
                self.kind()
            ))
            .into());
        }
        if draft.parent_id.is_some() && !self.descriptor.traits.parent {
            return Err(EntityError::Validation(format!(
                "{} records have no parent",
                self.kind()
            ))
            .into());
        }
        Ok(())
    }

    fn validate_projection(&self, fields: &[String]) -> Result<()> {
        for field in fields {
            if !self.descriptor.is_projectable(field) {
                return Err(EntityError::UnknownField {
                    kind: self.kind().to_string(),
                    field: field.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn validate_includes(&self, include: &[String]) -> Result<()> {
        for name in include {
            if self.descriptor.relation(name).is_none() {
                return Err(EntityError::UnknownRelation {
                    kind: self.kind().to_string(),
                    relation: name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn draft_reference_targets(&self, draft: &Draft) -> HashMap<String, RecordId> {
        let mut targets = HashMap::new();
        for reference in &self.descriptor.permission_references {
            if let Some(Value::String(raw)) = draft.attributes.get(&reference.id_field()) {
                if let Ok(id) = RecordId::from_str(raw) {
                    targets.insert(reference.name.clone(), id);
                }
            }
        }
        targets
    }

    // ---- operations -----------------------------------------------------

    /// Create one record.
    #[instrument(skip_all, fields(kind = %self.descriptor.kind))]
    pub async fn create(&self, draft: Draft) -> Result<EntityRecord> {
        let mut draft = draft;
        self.validate_draft(&draft)?;
        for validator in &self.validators {
            validator(&draft)?;
        }

        let resolver = self.ctx.resolver();
        let targets = self.draft_reference_targets(&draft);
        let decision = self.ctx.engine.can_create(
            self.requester,
            &self.descriptor,
            draft.user_id.or(if self.descriptor.traits.user_owned {
                Some(self.target_user)
            } else {
                None
            }),
            draft.team_id.or(self.target_team),
            &targets,
            &resolver,
        );
        if let Decision::Denied(reason) = decision {
            return Err(PermissionError::Denied(reason.to_string()).into());
        }

        self.ctx
            .hooks
            .run_before_create(self.kind(), &mut draft)
            .await?;

        let now = Utc::now();
        let record = EntityRecord {
            id: draft.id.unwrap_or_default(),
            kind: self.kind().to_string(),
            created_at: now,
            created_by: self.requester,
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            user_id: if self.descriptor.traits.user_owned {
                draft.user_id.or(Some(self.target_user))
            } else {
                None
            },
            team_id: if self.descriptor.traits.team_owned {
                draft.team_id.or(self.target_team)
            } else {
                None
            },
            parent_id: draft.parent_id,
            attributes: draft.attributes.clone(),
        };

        let (handle, owned) = self.obtain_session();
        let result = async {
            handle.with(|session| session.insert(record.clone()))?;
            self.ctx.hooks.run_after_create(self.kind(), &record).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.finish(handle, owned)?;
                debug!(id = %record.id, "created record");
                Ok(record)
            }
            Err(e) => {
                handle.rollback();
                Err(e)
            }
        }
    }

    /// Create several records; each item persists in its own
    /// transaction and failures are collected per item.
    pub async fn create_batch(&self, drafts: Vec<Draft>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for (index, draft) in drafts.into_iter().enumerate() {
            match self.create(draft).await {
                Ok(record) => outcome.succeeded.push(record),
                Err(e) => outcome.errors.push((index.to_string(), e.to_string())),
            }
        }
        self.conclude_batch(outcome)
    }

    /// Fetch one record.
    #[instrument(skip_all, fields(kind = %self.descriptor.kind, %id))]
    pub async fn get(&self, id: RecordId, options: GetOptions) -> Result<EntityView> {
        self.validate_projection(&options.fields)?;
        self.validate_includes(&options.include)?;
        self.require_level(id, AccessLevel::View)?;

        let not_found = || -> Error {
            EntityError::NotFound {
                kind: self.kind().to_string(),
                id,
            }
            .into()
        };

        let (handle, owned) = self.obtain_session();
        let record = handle
            .with(|session| Ok(session.get(self.kind(), id)))?
            .ok_or_else(not_found)?;
        self.finish(handle, owned)?;

        // Tombstones are visible only to root, and only on request.
        if record.is_deleted() && !(self.is_root() && options.include_deleted) {
            return Err(not_found());
        }

        let included = self.hydrate(&record, &options.include)?;
        Ok(EntityView {
            record: record.project(&options.fields),
            included,
        })
    }

    /// List records the requester can see.
    #[instrument(skip_all, fields(kind = %self.descriptor.kind))]
    pub async fn list(&self, options: ListOptions) -> Result<Vec<EntityView>> {
        self.validate_filters(&options.filters)?;
        self.collect(options, &[]).await
    }

    /// Search records with structured per-field clauses. Transformer
    /// parameters expand to clauses before the permission filter runs.
    #[instrument(skip_all, fields(kind = %self.descriptor.kind))]
    pub async fn search(
        &self,
        params: HashMap<String, Value>,
        options: ListOptions,
    ) -> Result<Vec<EntityView>> {
        let clauses = resolve_clauses(&self.descriptor, &self.transformers, &params)?;
        self.validate_filters(&options.filters)?;
        self.collect(options, &clauses).await
    }

    /// Whether a record exists and is visible to the requester.
    pub async fn exists(&self, id: RecordId) -> bool {
        let resolver = self.ctx.resolver();
        self.ctx
            .engine
            .check(self.requester, self.kind(), id, AccessLevel::View, &resolver)
            .is_granted()
    }

    /// Count records the requester can see.
    pub async fn count(&self, options: ListOptions) -> Result<usize> {
        let mut options = options;
        options.limit = None;
        options.offset = None;
        Ok(self.list(options).await?.len())
    }

    /// Update one record.
    #[instrument(skip_all, fields(kind = %self.descriptor.kind, %id))]
    pub async fn update(&self, id: RecordId, patch: Patch) -> Result<EntityRecord> {
        let mut patch = patch;
        self.validate_attributes(&patch.attributes)?;
        self.require_level(id, AccessLevel::Edit)?;

        let (handle, owned) = self.obtain_session();
        let result = self.update_in(&handle, id, &mut patch).await;
        match result {
            Ok(record) => {
                self.finish(handle, owned)?;
                Ok(record)
            }
            Err(e) => {
                handle.rollback();
                Err(e)
            }
        }
    }

    async fn update_in(
        &self,
        handle: &SessionHandle,
        id: RecordId,
        patch: &mut Patch,
    ) -> Result<EntityRecord> {
        let previous = handle
            .with(|session| Ok(session.get(self.kind(), id)))?
            .ok_or_else(|| EntityError::NotFound {
                kind: self.kind().to_string(),
                id,
            })?;

        if self.updated_at_guard || patch.expected_updated_at.is_some() {
            if previous.updated_at != patch.expected_updated_at {
                return Err(EntityError::PreconditionFailed(format!(
                    "{} {} was modified concurrently",
                    self.kind(),
                    id
                ))
                .into());
            }
        }

        self.ctx
            .hooks
            .run_before_update(self.kind(), id, patch)
            .await?;
        // Hooks may have added attributes; re-validate the final shape.
        self.validate_attributes(&patch.attributes)?;

        let mut record = previous.clone();
        for (name, value) in &patch.attributes {
            record.attributes.insert(name.clone(), value.clone());
        }
        if self.descriptor.traits.update_audit {
            record.updated_at = Some(Utc::now());
            record.updated_by = Some(self.requester);
        }

        handle.with(|session| session.update(record.clone()))?;
        self.ctx
            .hooks
            .run_after_update(self.kind(), &record, &previous)
            .await?;
        debug!(%id, "updated record");
        Ok(record)
    }

    /// Update several records, collecting per-item failures. With a
    /// batch concurrency above one, items fan out in bounded waves.
    pub async fn batch_update(&self, items: Vec<(RecordId, Patch)>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for wave in items.chunks(self.batch_concurrency) {
            let results = futures::future::join_all(
                wave.iter().map(|(id, patch)| self.update(*id, patch.clone())),
            )
            .await;
            for ((id, _), result) in wave.iter().zip(results) {
                match result {
                    Ok(record) => outcome.succeeded.push(record),
                    Err(e) => outcome.errors.push((id.to_string(), e.to_string())),
                }
            }
        }
        self.conclude_batch(outcome)
    }

    /// Soft-delete one record.
    #[instrument(skip_all, fields(kind = %self.descriptor.kind, %id))]
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        if !self.descriptor.traits.soft_delete {
            return Err(EntityError::Validation(format!(
                "{} records cannot be deleted",
                self.kind()
            ))
            .into());
        }
        self.require_level(id, AccessLevel::Delete)?;

        let (handle, owned) = self.obtain_session();
        let result = async {
            let record = handle
                .with(|session| Ok(session.get(self.kind(), id)))?
                .ok_or_else(|| EntityError::NotFound {
                    kind: self.kind().to_string(),
                    id,
                })?;

            self.ctx.hooks.run_before_delete(self.kind(), &record).await?;

            let mut tombstone = record.clone();
            tombstone.deleted_at = Some(Utc::now());
            tombstone.deleted_by = Some(self.requester);
            handle.with(|session| session.update(tombstone.clone()))?;

            self.ctx
                .hooks
                .run_after_delete(self.kind(), &tombstone)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.finish(handle, owned)?;
                debug!(%id, "soft-deleted record");
                Ok(())
            }
            Err(e) => {
                handle.rollback();
                Err(e)
            }
        }
    }

    /// Soft-delete several records, collecting per-item failures. With
    /// a batch concurrency above one, items fan out in bounded waves.
    pub async fn batch_delete(&self, ids: Vec<RecordId>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for wave in ids.chunks(self.batch_concurrency) {
            let results =
                futures::future::join_all(wave.iter().map(|id| self.delete(*id))).await;
            for (id, result) in wave.iter().zip(results) {
                match result {
                    Ok(()) => {
                        if let Some(record) = self.ctx.store.fetch(self.kind(), *id) {
                            outcome.succeeded.push(record);
                        }
                    }
                    Err(e) => outcome.errors.push((id.to_string(), e.to_string())),
                }
            }
        }
        self.conclude_batch(outcome)
    }

    // ---- shared internals ----------------------------------------------

    fn conclude_batch(&self, outcome: BatchOutcome) -> Result<BatchOutcome> {
        if !outcome.errors.is_empty() && self.batch_mode == BatchErrorMode::Aggregate {
            return Err(EntityError::Batch {
                succeeded: outcome.succeeded.len(),
                errors: outcome.errors,
            }
            .into());
        }
        Ok(outcome)
    }

    fn validate_filters(&self, filters: &HashMap<String, Value>) -> Result<()> {
        for name in filters.keys() {
            if !self.descriptor.is_projectable(name) {
                return Err(EntityError::UnknownField {
                    kind: self.kind().to_string(),
                    field: name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The shared list/search path: gather, filter, sort, page, and
    /// hydrate.
    async fn collect(
        &self,
        options: ListOptions,
        clauses: &[(String, crate::search::SearchClause)],
    ) -> Result<Vec<EntityView>> {
        self.validate_projection(&options.fields)?;
        self.validate_includes(&options.include)?;
        if let Some(sort_by) = &options.sort_by {
            if !self.descriptor.is_projectable(sort_by) {
                return Err(EntityError::UnknownField {
                    kind: self.kind().to_string(),
                    field: sort_by.clone(),
                }
                .into());
            }
        }

        let predicate = self.ctx.engine.filter(
            self.requester,
            self.kind(),
            AccessLevel::View,
            self.descriptor.system,
            options.include_deleted,
        );

        let (handle, owned) = self.obtain_session();
        let records = handle.with(|session| Ok(session.list(self.kind())))?;
        self.finish(handle, owned)?;

        let mut visible: Vec<EntityRecord> = records
            .into_iter()
            .filter(|record| record_matches(record, clauses))
            .filter(|record| self.equality_filters_match(record, &options.filters))
            .filter(|record| predicate.matches(&record.facts(&self.descriptor)))
            .collect();

        self.sort_records(&mut visible, options.sort_by.as_deref(), options.ascending);

        let offset = options.offset.unwrap_or(0);
        let page: Vec<EntityRecord> = visible
            .into_iter()
            .skip(offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        let mut views = Vec::with_capacity(page.len());
        for record in page {
            let included = self.hydrate(&record, &options.include)?;
            views.push(EntityView {
                record: record.project(&options.fields),
                included,
            });
        }
        Ok(views)
    }

    fn equality_filters_match(
        &self,
        record: &EntityRecord,
        filters: &HashMap<String, Value>,
    ) -> bool {
        filters.iter().all(|(name, expected)| match name.as_str() {
            "id" => expected.as_str() == Some(record.id.to_string().as_str()),
            "user_id" => {
                expected.as_str() == record.user_id.map(|u| u.to_string()).as_deref()
            }
            "team_id" => {
                expected.as_str() == record.team_id.map(|t| t.to_string()).as_deref()
            }
            "parent_id" => {
                expected.as_str() == record.parent_id.map(|p| p.to_string()).as_deref()
            }
            _ => record.attribute(name) == Some(expected),
        })
    }

    fn sort_records(&self, records: &mut [EntityRecord], sort_by: Option<&str>, ascending: bool) {
        match sort_by {
            None => {
                // Newest first, tie-break by id for a stable order.
                records.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                });
            }
            Some("created_at") | Some("updated_at") | Some("deleted_at") => {
                let field = sort_by.unwrap().to_string();
                records.sort_by(|a, b| {
                    let (ka, kb) = match field.as_str() {
                        "created_at" => (Some(a.created_at), Some(b.created_at)),
                        "updated_at" => (a.updated_at, b.updated_at),
                        _ => (a.deleted_at, b.deleted_at),
                    };
                    let ordering = ka.cmp(&kb).then_with(|| a.id.cmp(&b.id));
                    if ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                });
            }
            Some(field) => {
                let field = field.to_string();
                records.sort_by(|a, b| {
                    let ordering = compare_values(a.attribute(&field), b.attribute(&field))
                        .then_with(|| a.id.cmp(&b.id));
                    if ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                });
            }
        }
    }

    /// Hydrate requested relations, restricted to what the requester
    /// may view on the related kind.
    fn hydrate(
        &self,
        record: &EntityRecord,
        include: &[String],
    ) -> Result<BTreeMap<String, Vec<EntityRecord>>> {
        let mut included = BTreeMap::new();
        for name in include {
            let relation = self
                .descriptor
                .relation(name)
                .ok_or_else(|| EntityError::UnknownRelation {
                    kind: self.kind().to_string(),
                    relation: name.clone(),
                })?;
            let target_descriptor = self.ctx.kinds.require(&relation.target_kind)?;
            let predicate = self.ctx.engine.filter(
                self.requester,
                &relation.target_kind,
                AccessLevel::View,
                target_descriptor.system,
                false,
            );
            let id_string = record.id.to_string();
            let related: Vec<EntityRecord> = self
                .ctx
                .store
                .fetch_kind(&relation.target_kind)
                .into_iter()
                .filter(|r| {
                    r.attribute(&relation.foreign_key)
                        .and_then(Value::as_str)
                        .map(|s| s == id_string)
                        .unwrap_or(false)
                        || r.parent_id == Some(record.id)
                })
                .filter(|r| predicate.matches(&r.facts(&target_descriptor)))
                .collect();
            included.insert(name.clone(), related);
        }
        Ok(included)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}
