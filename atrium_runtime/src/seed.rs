//! Idempotent seeding of system entities.
//!
//! Seeds are declarative rows with stable identifiers in the reserved
//! high range, inserted through the regular pipeline (so hooks and
//! audit stamping apply) in topological order of the kinds' permission
//! references. Reseeding is a no-op for rows whose id already exists.

use atrium_core::error::{Result, SeedError};
use atrium_core::id::RecordId;
use atrium_core::types::SystemPrincipals;
use atrium_entity::{Draft, Manager, ManagerContext};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Which distinguished principal a seed is created as.
///
/// Template-owned seeds get template semantics (readable by everyone,
/// mutable by root/system only); most seeds belong to the system
/// principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedOwner {
    /// Created by the system principal.
    #[default]
    System,
    /// Created by the template principal.
    Template,
    /// Created by the root principal.
    Root,
}

/// One declarative seed row.
#[derive(Debug, Clone)]
pub struct Seed {
    /// Kind of the record.
    pub kind: String,
    /// Stable index in the reserved id range; the record id is
    /// `RecordId::seeded(index)`, which is what makes reseeding
    /// idempotent.
    pub index: u64,
    /// Principal the record is created as.
    pub owner: SeedOwner,
    /// The record payload.
    pub draft: Draft,
}

impl Seed {
    /// Declare a seed.
    pub fn new(kind: impl Into<String>, index: u64, draft: Draft) -> Self {
        Self {
            kind: kind.into(),
            index,
            owner: SeedOwner::System,
            draft,
        }
    }

    /// Create the seed as another distinguished principal.
    pub fn owned_by(mut self, owner: SeedOwner) -> Self {
        self.owner = owner;
        self
    }

    /// The stable record id of this seed.
    pub fn record_id(&self) -> RecordId {
        RecordId::seeded(self.index)
    }
}

/// A source of seed rows.
///
/// Static seed lists implement this trivially; kinds whose seeds depend
/// on earlier-seeded records compute them at call time.
pub trait SeedSource: Send + Sync {
    /// The seeds to apply.
    fn seeds(&self) -> Vec<Seed>;
}

impl SeedSource for Vec<Seed> {
    fn seeds(&self) -> Vec<Seed> {
        self.clone()
    }
}

/// Outcome of one seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Rows inserted in this pass.
    pub created: usize,
    /// Rows whose id already existed.
    pub skipped: usize,
}

/// Runs seeding passes against the pipeline.
pub struct Seeder {
    ctx: ManagerContext,
    system: SystemPrincipals,
}

impl Seeder {
    /// Build a seeder over the pipeline context.
    pub fn new(ctx: ManagerContext, system: SystemPrincipals) -> Self {
        Self { ctx, system }
    }

    /// Kinds ordered so that referenced kinds seed before the kinds
    /// referencing them. Reference cycles are tolerated (the walk stops
    /// at repeats) since seed rows rarely close them.
    fn kind_order(&self, seeds: &[Seed]) -> Vec<String> {
        let mut kinds: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for seed in seeds {
            let deps = self
                .ctx
                .kinds
                .get(&seed.kind)
                .map(|d| {
                    d.permission_references
                        .iter()
                        .map(|r| r.target_kind.clone())
                        .collect()
                })
                .unwrap_or_default();
            kinds.entry(seed.kind.clone()).or_insert(deps);
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        fn visit(
            kind: &str,
            kinds: &BTreeMap<String, Vec<String>>,
            visited: &mut HashSet<String>,
            order: &mut Vec<String>,
        ) {
            if !visited.insert(kind.to_string()) {
                return;
            }
            if let Some(deps) = kinds.get(kind) {
                for dep in deps {
                    visit(dep, kinds, visited, order);
                }
            }
            if kinds.contains_key(kind) {
                order.push(kind.to_string());
            }
        }
        for kind in kinds.keys() {
            visit(kind, &kinds, &mut visited, &mut order);
        }
        order
    }

    /// Insert every seed whose id is absent. Reseeding leaves row
    /// counts unchanged.
    pub async fn seed(&self, seeds: &[Seed]) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let order = self.kind_order(seeds);

        for kind in &order {
            for seed in seeds.iter().filter(|s| &s.kind == kind) {
                let id = seed.record_id();
                if self.ctx.store.fetch(kind, id).is_some() {
                    debug!(kind = %kind, %id, "seed row already present");
                    report.skipped += 1;
                    continue;
                }

                let descriptor = self.ctx.kinds.get(kind).ok_or_else(|| {
                    SeedError::UnknownKind(kind.clone())
                })?;
                let requester = match seed.owner {
                    SeedOwner::System => self.system.system,
                    SeedOwner::Template => self.system.template,
                    SeedOwner::Root => self.system.root,
                };

                let manager = Manager::new(descriptor, self.ctx.clone(), requester)?;
                let draft = seed.draft.clone().with_id(id);
                match manager.create(draft).await {
                    Ok(_) => {
                        debug!(kind = %kind, %id, "seeded row");
                        report.created += 1;
                    }
                    Err(e) => {
                        warn!(kind = %kind, %id, error = %e, "seed row failed");
                        return Err(SeedError::Failed {
                            kind: kind.clone(),
                            reason: e.to_string(),
                        }
                        .into());
                    }
                }
            }
        }

        info!(
            created = report.created,
            skipped = report.skipped,
            "seeding complete"
        );
        Ok(report)
    }

    /// Apply several sources in turn, evaluating each one after its
    /// predecessors have seeded so dependent lists can look records up.
    pub async fn seed_sources(&self, sources: &[&dyn SeedSource]) -> Result<SeedReport> {
        let mut total = SeedReport::default();
        for source in sources {
            let report = self.seed(&source.seeds()).await?;
            total.created += report.created;
            total.skipped += report.skipped;
        }
        Ok(total)
    }
}
