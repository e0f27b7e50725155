//! Integration tests for the permission engine: the full rule chain,
//! reference inheritance, filtering, creation, and delegation.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};

use atrium_core::id::{RecordId, RoleId, TeamId, UserId};
use atrium_core::types::{
    AccessLevel, KindDescriptor, KindTraits, PermissionReference, SystemPrincipals, TeamMembership,
};
use atrium_permission::{
    AccessFlags, Decision, DenialReason, DirectoryStore, Grant, GrantStore, GrantSubject,
    InMemoryDirectory, InMemoryGrantStore, PermissionEngine, ResourceFacts, ResourceResolver, Role,
    Team, ROLE_ADMIN, ROLE_SUPERADMIN, ROLE_USER,
};

/// A resolver over a fixed set of records, standing in for the entity
/// store.
#[derive(Default)]
struct StubResolver {
    facts: HashMap<(String, RecordId), ResourceFacts>,
    descriptors: HashMap<String, KindDescriptor>,
}

impl StubResolver {
    fn insert(&mut self, facts: ResourceFacts) {
        self.facts.insert((facts.kind.clone(), facts.id), facts);
    }

    fn describe(&mut self, descriptor: KindDescriptor) {
        self.descriptors.insert(descriptor.kind.clone(), descriptor);
    }
}

impl ResourceResolver for StubResolver {
    fn resource(&self, kind: &str, id: RecordId) -> Option<ResourceFacts> {
        self.facts.get(&(kind.to_string(), id)).cloned()
    }

    fn descriptor(&self, kind: &str) -> Option<KindDescriptor> {
        self.descriptors.get(kind).cloned()
    }
}

struct Fixture {
    engine: PermissionEngine,
    directory: Arc<InMemoryDirectory>,
    grants: Arc<InMemoryGrantStore>,
    system: SystemPrincipals,
    admin_role: RoleId,
    user_role: RoleId,
}

fn fixture() -> Fixture {
    let system = SystemPrincipals {
        root: UserId::from_str("ffffffff-ffff-ffff-ffff-ffffffffffff").unwrap(),
        system: UserId::from_str("ffffffff-ffff-ffff-aaaa-ffffffffffff").unwrap(),
        template: UserId::from_str("ffffffff-ffff-ffff-0000-ffffffffffff").unwrap(),
    };

    let directory = Arc::new(InMemoryDirectory::new());
    let super_role = RoleId::seeded(0x10);
    let admin_role = RoleId::seeded(0x11);
    let user_role = RoleId::seeded(0x12);
    directory
        .upsert_role(Role::root(super_role, ROLE_SUPERADMIN))
        .unwrap();
    directory
        .upsert_role(Role::child_of(admin_role, ROLE_ADMIN, super_role))
        .unwrap();
    directory
        .upsert_role(Role::child_of(user_role, ROLE_USER, admin_role))
        .unwrap();

    let grants = Arc::new(InMemoryGrantStore::new());
    let engine = PermissionEngine::new(
        system,
        directory.clone() as Arc<dyn DirectoryStore>,
        grants.clone() as Arc<dyn GrantStore>,
        5,
    );

    Fixture {
        engine,
        directory,
        grants,
        system,
        admin_role,
        user_role,
    }
}

fn owned_record(kind: &str, owner: UserId) -> ResourceFacts {
    ResourceFacts {
        kind: kind.to_string(),
        id: RecordId::new(),
        created_by: owner,
        user_id: Some(owner),
        team_id: None,
        deleted: false,
        references: Vec::new(),
    }
}

#[test]
fn soft_deleted_records_are_invisible_to_everyone_but_root() {
    let fx = fixture();
    let owner = UserId::new();
    let mut record = owned_record("project", owner);
    record.deleted = true;

    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());

    // Even the owner sees a tombstone as not-found.
    let decision = fx
        .engine
        .check(owner, "project", record.id, AccessLevel::View, &resolver);
    assert_eq!(decision, Decision::Denied(DenialReason::NotFound));

    // Root still sees it.
    let decision = fx
        .engine
        .check(fx.system.root, "project", record.id, AccessLevel::View, &resolver);
    assert_eq!(decision, Decision::Granted);
}

#[test]
fn template_records_are_open_for_reads_and_closed_for_mutation() {
    let fx = fixture();
    let anyone = UserId::new();
    let mut record = owned_record("agent", fx.system.template);
    record.user_id = Some(fx.system.template);

    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());

    for level in [
        AccessLevel::View,
        AccessLevel::Execute,
        AccessLevel::Copy,
        AccessLevel::Share,
    ] {
        let decision = fx.engine.check(anyone, "agent", record.id, level, &resolver);
        assert_eq!(decision, Decision::Granted, "level {level}");
    }
    for level in [AccessLevel::Edit, AccessLevel::Delete] {
        let decision = fx.engine.check(anyone, "agent", record.id, level, &resolver);
        assert_eq!(
            decision,
            Decision::Denied(DenialReason::TemplateOwned),
            "level {level}"
        );
        // Root and system may still mutate.
        assert!(fx
            .engine
            .check(fx.system.system, "agent", record.id, level, &resolver)
            .is_granted());
    }
}

#[test]
fn system_kinds_reject_mutation_from_ordinary_principals() {
    let fx = fixture();
    let user = UserId::new();
    let record = owned_record("provider", fx.system.system);

    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());
    resolver.describe(KindDescriptor::new("provider").system());

    // Reads pass.
    assert!(fx
        .engine
        .check(user, "provider", record.id, AccessLevel::View, &resolver)
        .is_granted());

    // Everything above view is protected.
    for level in [AccessLevel::Execute, AccessLevel::Edit, AccessLevel::Delete] {
        let decision = fx
            .engine
            .check(user, "provider", record.id, level, &resolver);
        assert_eq!(decision, Decision::Denied(DenialReason::SystemProtected));
    }

    assert!(fx
        .engine
        .check(fx.system.system, "provider", record.id, AccessLevel::Edit, &resolver)
        .is_granted());
}

#[test]
fn team_membership_grants_by_role_dominance() {
    let fx = fixture();
    let team = TeamId::new();
    fx.directory.upsert_team(Team::root(team, "crew")).unwrap();

    let admin = UserId::new();
    let member = UserId::new();
    fx.directory
        .upsert_membership(TeamMembership::new(admin, team, fx.admin_role))
        .unwrap();
    fx.directory
        .upsert_membership(TeamMembership::new(member, team, fx.user_role))
        .unwrap();
    fx.engine.hierarchy().invalidate();

    let creator = UserId::new();
    let mut record = owned_record("conversation", creator);
    record.user_id = None;
    record.team_id = Some(team);

    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());

    // Both roles read; only the admin edits.
    assert!(fx
        .engine
        .check(member, "conversation", record.id, AccessLevel::View, &resolver)
        .is_granted());
    assert!(fx
        .engine
        .check(admin, "conversation", record.id, AccessLevel::Edit, &resolver)
        .is_granted());
    let decision = fx
        .engine
        .check(member, "conversation", record.id, AccessLevel::Edit, &resolver);
    assert_eq!(decision, Decision::Denied(DenialReason::InsufficientRole));
}

#[test]
fn expired_grants_and_memberships_do_not_grant() {
    let fx = fixture();
    let owner = UserId::new();
    let stranger = UserId::new();
    let record = owned_record("project", owner);

    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());

    // No grant yet: denied.
    assert!(!fx
        .engine
        .check(stranger, "project", record.id, AccessLevel::View, &resolver)
        .is_granted());

    // Active grant: granted.
    let grant = Grant::new(
        "project",
        record.id,
        GrantSubject::User(stranger),
        AccessFlags::view_only(),
        owner,
    )
    .with_expiry(Utc::now() + Duration::hours(1));
    fx.grants.add(grant.clone()).unwrap();
    assert!(fx
        .engine
        .check(stranger, "project", record.id, AccessLevel::View, &resolver)
        .is_granted());

    // The grant does not cover edit.
    assert!(!fx
        .engine
        .check(stranger, "project", record.id, AccessLevel::Edit, &resolver)
        .is_granted());

    // Expired grant: back to denied.
    fx.grants.remove(grant.id).unwrap();
    fx.grants
        .add(
            Grant::new(
                "project",
                record.id,
                GrantSubject::User(stranger),
                AccessFlags::view_only(),
                owner,
            )
            .with_expiry(Utc::now() - Duration::seconds(1)),
        )
        .unwrap();
    assert!(!fx
        .engine
        .check(stranger, "project", record.id, AccessLevel::View, &resolver)
        .is_granted());
}

#[test]
fn role_grants_apply_to_dominating_roles() {
    let fx = fixture();
    let team = TeamId::new();
    fx.directory.upsert_team(Team::root(team, "crew")).unwrap();

    let admin = UserId::new();
    let member = UserId::new();
    fx.directory
        .upsert_membership(TeamMembership::new(admin, team, fx.admin_role))
        .unwrap();
    fx.directory
        .upsert_membership(TeamMembership::new(member, team, fx.user_role))
        .unwrap();
    fx.engine.hierarchy().invalidate();

    let owner = UserId::new();
    let record = owned_record("report", owner);
    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());

    // Grant to the baseline role: holders of `user` and of any role
    // dominating it (admins) benefit.
    fx.grants
        .add(Grant::new(
            "report",
            record.id,
            GrantSubject::Role(fx.user_role),
            AccessFlags::view_only(),
            owner,
        ))
        .unwrap();

    assert!(fx
        .engine
        .check(member, "report", record.id, AccessLevel::View, &resolver)
        .is_granted());
    assert!(fx
        .engine
        .check(admin, "report", record.id, AccessLevel::View, &resolver)
        .is_granted());

    // A grant to the admin role does not leak to plain members.
    let second = owned_record("report", owner);
    resolver.insert(second.clone());
    fx.grants
        .add(Grant::new(
            "report",
            second.id,
            GrantSubject::Role(fx.admin_role),
            AccessFlags::view_only(),
            owner,
        ))
        .unwrap();
    assert!(!fx
        .engine
        .check(member, "report", second.id, AccessLevel::View, &resolver)
        .is_granted());
    assert!(fx
        .engine
        .check(admin, "report", second.id, AccessLevel::View, &resolver)
        .is_granted());
}

#[test]
fn reference_inheritance_follows_a_chain_of_three() {
    let fx = fixture();
    let owner = UserId::new();
    let reader = UserId::new();

    // project <- conversation <- message: access to the message is
    // inherited from the project through the chain.
    let project = owned_record("project", owner);
    let conversation = ResourceFacts {
        kind: "conversation".into(),
        id: RecordId::new(),
        created_by: owner,
        user_id: None,
        team_id: None,
        deleted: false,
        references: vec![("project".into(), "project".into(), Some(project.id))],
    };
    let message = ResourceFacts {
        kind: "message".into(),
        id: RecordId::new(),
        created_by: owner,
        user_id: None,
        team_id: None,
        deleted: false,
        references: vec![(
            "conversation".into(),
            "conversation".into(),
            Some(conversation.id),
        )],
    };

    let mut resolver = StubResolver::default();
    resolver.insert(project.clone());
    resolver.insert(conversation.clone());
    resolver.insert(message.clone());

    // Without standing on the project, the chain denies.
    assert!(!fx
        .engine
        .check(reader, "message", message.id, AccessLevel::View, &resolver)
        .is_granted());

    // Grant view on the root of the chain; the message inherits it.
    fx.grants
        .add(Grant::new(
            "project",
            project.id,
            GrantSubject::User(reader),
            AccessFlags::view_only(),
            owner,
        ))
        .unwrap();
    assert!(fx
        .engine
        .check(reader, "message", message.id, AccessLevel::View, &resolver)
        .is_granted());
}

#[test]
fn reference_cycles_terminate() {
    let fx = fixture();
    let owner = UserId::new();
    let reader = UserId::new();

    let a_id = RecordId::new();
    let b_id = RecordId::new();
    let a = ResourceFacts {
        kind: "node".into(),
        id: a_id,
        created_by: owner,
        user_id: None,
        team_id: None,
        deleted: false,
        references: vec![("peer".into(), "node".into(), Some(b_id))],
    };
    let b = ResourceFacts {
        kind: "node".into(),
        id: b_id,
        created_by: owner,
        user_id: None,
        team_id: None,
        deleted: false,
        references: vec![("peer".into(), "node".into(), Some(a_id))],
    };

    let mut resolver = StubResolver::default();
    resolver.insert(a);
    resolver.insert(b);

    // Must terminate and deny rather than loop.
    let decision = fx
        .engine
        .check(reader, "node", a_id, AccessLevel::View, &resolver);
    assert_eq!(decision, Decision::Denied(DenialReason::NoRule));
}

#[test]
fn filter_agrees_with_check_on_direct_standing() {
    let fx = fixture();
    let team = TeamId::new();
    fx.directory.upsert_team(Team::root(team, "crew")).unwrap();

    let requester = UserId::new();
    fx.directory
        .upsert_membership(TeamMembership::new(requester, team, fx.user_role))
        .unwrap();
    fx.engine.hierarchy().invalidate();

    let stranger = UserId::new();
    let mut records = vec![
        owned_record("project", requester),
        owned_record("project", stranger),
        owned_record("project", fx.system.template),
    ];
    // A team-owned record and a granted record.
    let mut team_record = owned_record("project", stranger);
    team_record.user_id = None;
    team_record.team_id = Some(team);
    records.push(team_record);
    let granted = owned_record("project", stranger);
    fx.grants
        .add(Grant::new(
            "project",
            granted.id,
            GrantSubject::User(requester),
            AccessFlags::view_only(),
            stranger,
        ))
        .unwrap();
    records.push(granted);
    // A tombstone never appears.
    let mut deleted = owned_record("project", requester);
    deleted.deleted = true;
    records.push(deleted);

    let mut resolver = StubResolver::default();
    for record in &records {
        resolver.insert(record.clone());
    }

    let predicate = fx
        .engine
        .filter(requester, "project", AccessLevel::View, false, false);
    let listed: Vec<_> = records.iter().filter(|r| predicate.matches(r)).collect();

    // No false positives: everything listed passes check.
    for record in &listed {
        assert!(
            fx.engine
                .check(requester, "project", record.id, AccessLevel::View, &resolver)
                .is_granted(),
            "listed record {} fails check",
            record.id
        );
    }
    // No false negatives on ownership: the requester's own live record
    // is present, the tombstone is not.
    assert!(listed.iter().any(|r| r.id == records[0].id));
    assert!(!listed.iter().any(|r| r.deleted));
    // Team and grant standing both made it in.
    assert_eq!(listed.len(), 4);
}

#[test]
fn root_filter_includes_tombstones_only_on_request() {
    let fx = fixture();
    let mut record = owned_record("project", UserId::new());
    record.deleted = true;

    let plain = fx
        .engine
        .filter(fx.system.root, "project", AccessLevel::View, false, false);
    assert!(!plain.matches(&record));

    let with_deleted = fx
        .engine
        .filter(fx.system.root, "project", AccessLevel::View, false, true);
    assert!(with_deleted.matches(&record));

    // Non-root principals cannot opt into tombstones.
    let sneaky = fx
        .engine
        .filter(UserId::new(), "project", AccessLevel::View, false, true);
    assert!(!sneaky.matches(&record));
}

#[test]
fn creation_requires_edit_on_the_create_reference() {
    let fx = fixture();
    let owner = UserId::new();
    let outsider = UserId::new();

    let project = owned_record("project", owner);
    let mut resolver = StubResolver::default();
    resolver.insert(project.clone());

    let descriptor = KindDescriptor::new("conversation")
        .with_traits(KindTraits {
            user_owned: true,
            ..Default::default()
        })
        .with_reference(PermissionReference::new("project", "project"));

    let mut refs = HashMap::new();
    refs.insert("project".to_string(), project.id);

    // The owner holds edit on the project and may create under it.
    assert!(fx
        .engine
        .can_create(owner, &descriptor, Some(owner), None, &refs, &resolver)
        .is_granted());

    // A view-only grant is not enough: creation needs edit.
    fx.grants
        .add(Grant::new(
            "project",
            project.id,
            GrantSubject::User(outsider),
            AccessFlags::view_only(),
            owner,
        ))
        .unwrap();
    assert!(!fx
        .engine
        .can_create(outsider, &descriptor, Some(outsider), None, &refs, &resolver)
        .is_granted());

    // A missing reference target denies outright.
    assert!(!fx
        .engine
        .can_create(
            outsider,
            &descriptor,
            Some(outsider),
            None,
            &HashMap::new(),
            &resolver
        )
        .is_granted());
}

#[test]
fn grant_delegation_rules() {
    let fx = fixture();
    let owner = UserId::new();
    let outsider = UserId::new();

    let record = owned_record("project", owner);
    let mut resolver = StubResolver::default();
    resolver.insert(record.clone());

    let grant = Grant::new(
        "project",
        record.id,
        GrantSubject::User(outsider),
        AccessFlags::view_only(),
        owner,
    );

    // The owner may share; an outsider may not.
    assert!(fx.engine.authorize_grant(owner, &grant, &resolver).is_ok());
    assert!(fx
        .engine
        .authorize_grant(outsider, &grant, &resolver)
        .is_err());

    // Global grants are reserved to root/system.
    let global = Grant::new(
        "project",
        record.id,
        GrantSubject::Global,
        AccessFlags::view_only(),
        owner,
    );
    assert!(fx.engine.authorize_grant(owner, &global, &resolver).is_err());
    assert!(fx
        .engine
        .authorize_grant(fx.system.system, &global, &resolver)
        .is_ok());
}
