use anyhow::Result;
use async_trait::async_trait;
use cms_database::{schema, DestinationStore, MemoryStore, QueryCriteria, Row, StoreError};
use cms_migrator::{
    entities, Executor, ExecutorOptions, FailureKind, MigrationContext, MigrationPlan, MigrationReport,
};
use cms_source::bson::{doc, Document};
use cms_source::{Classification, Classifier, Collection, CollectionStore};
use uuid::Uuid;

fn dump(docs: &[Document]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for d in docs {
        d.to_writer(&mut buf)?;
    }
    Ok(buf)
}

fn sample_dump() -> Result<CollectionStore> {
    let buf = dump(&[
        doc! { "_id": "i1", "name": "Govt Polytechnic", "code": "GPT", "city": "Pune" },
        doc! { "_id": "u1", "email": "a@b.com", "password": "x", "role": "STUDENT" },
        doc! { "_id": "u2", "email": "A@B.com", "password": "y" },
        doc! { "email": "c@d.com", "password": "z" },
        doc! { "_id": "s1", "userId": "u1", "rollNumber": "R1" },
        doc! { "_id": "s2", "userId": "ghost", "rollNumber": "R2" },
        doc! { "_id": "s3", "userId": "u2", "rollNumber": "R3" },
        doc! { "_id": "z", "randomField": 1 },
    ])?;
    Ok(CollectionStore::from_archive(&buf, &Classifier::default()))
}

async fn run(store: &dyn DestinationStore, source: &CollectionStore, options: ExecutorOptions) -> Result<MigrationReport> {
    let plan = MigrationPlan::new(entities::all())?;
    let mut ctx = MigrationContext::default();
    Executor::new(store, options).run(&plan, source, &mut ctx).await
}

#[tokio::test]
async fn test_every_record_is_accounted_for() -> Result<()> {
    let source = sample_dump()?;
    let store = MemoryStore::new()
        .with_unique(schema::USERS, &["email"])
        .with_foreign_key(schema::STUDENTS, "user_id", schema::USERS);

    let report = run(&store, &source, ExecutorOptions::default()).await?;
    assert!(report.is_balanced());
    assert_eq!(report.entities.len(), 22);
    assert_eq!(report.unidentified, 1);

    let users = report.entity(Collection::Users).unwrap();
    assert_eq!((users.total, users.migrated, users.skipped, users.errors), (3, 1, 2, 0));
    assert_eq!(users.skip_reasons.get("duplicate"), Some(&1));
    assert_eq!(users.skip_reasons.get("missing_source_id"), Some(&1));

    let totals = report.totals();
    assert_eq!(totals.total, 7);
    assert_eq!(totals.migrated + totals.skipped + totals.errors, totals.total);
    Ok(())
}

#[tokio::test]
async fn test_student_without_migrated_user_is_skipped() -> Result<()> {
    let source = sample_dump()?;
    let store = MemoryStore::new();

    let report = run(&store, &source, ExecutorOptions::default()).await?;
    let students = report.entity(Collection::Students).unwrap();
    assert_eq!((students.total, students.migrated, students.skipped), (3, 1, 2));
    assert_eq!(students.skip_reasons.get("unresolved_reference"), Some(&1));
    // s3 belongs to u2, which was folded into u1 and so duplicates s1
    assert_eq!(students.skip_reasons.get("duplicate"), Some(&1));

    let user_id = store.rows(schema::USERS)[0].uuid("id");
    let rows = store.rows(schema::STUDENTS);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].uuid("user_id"), user_id);
    assert_eq!(rows[0].text("roll_number"), Some("R1"));
    Ok(())
}

#[tokio::test]
async fn test_dry_run_touches_nothing() -> Result<()> {
    let source = sample_dump()?;
    let store = MemoryStore::new();
    let options = ExecutorOptions { dry_run: true, ..Default::default() };

    let report = run(&store, &source, options).await?;
    assert_eq!(store.write_calls(), 0);
    assert_eq!(store.read_calls(), 0);
    assert!(report.dry_run);
    assert!(report.is_balanced());
    for e in &report.entities {
        assert_eq!((e.migrated, e.skipped, e.errors), (0, 0, 0));
        assert_eq!(e.planned, e.total);
    }
    assert_eq!(report.totals().planned, 7);
    assert!(report.id_map_sizes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_clear_and_skip_clear() -> Result<()> {
    let source = sample_dump()?;
    let stale = Row::new().with("id", Uuid::new_v4()).with("email", "old@x.com");

    let store = MemoryStore::new();
    store.seed(schema::USERS, vec![stale.clone()]);
    run(&store, &source, ExecutorOptions::default()).await?;
    assert_eq!(store.rows(schema::USERS).len(), 1);

    let store = MemoryStore::new();
    store.seed(schema::USERS, vec![stale]);
    run(&store, &source, ExecutorOptions { skip_clear: true, ..Default::default() }).await?;
    assert_eq!(store.rows(schema::USERS).len(), 2);
    Ok(())
}

fn bucketed(docs: Vec<(Collection, Document)>) -> CollectionStore {
    let mut store = CollectionStore::new();
    for (collection, d) in docs {
        store.insert(Classification::Collection(collection), d);
    }
    store
}

#[tokio::test]
async fn test_unique_violation_is_a_skip_and_unmaps_the_record() -> Result<()> {
    let source = bucketed(vec![
        (Collection::Institutions, doc! { "_id": "i1", "name": "GPT", "code": "A" }),
        (Collection::Institutions, doc! { "_id": "i2", "name": "GPT", "code": "B" }),
        (Collection::Departments, doc! { "_id": "d1", "institutionId": "i2", "name": "Mech", "code": "ME" }),
    ]);
    let store = MemoryStore::new().with_unique(schema::INSTITUTIONS, &["name"]);
    let plan = MigrationPlan::select(entities::all(), &[Collection::Institutions, Collection::Departments])?;
    let mut ctx = MigrationContext::default();

    let report = Executor::new(&store, ExecutorOptions::default()).run(&plan, &source, &mut ctx).await?;
    let institutions = report.entity(Collection::Institutions).unwrap();
    assert_eq!((institutions.migrated, institutions.skipped), (1, 1));
    assert_eq!(institutions.skip_reasons.get("constraint_violation"), Some(&1));
    assert_eq!(ctx.translator.resolve("i2", Collection::Institutions), None);

    let departments = report.entity(Collection::Departments).unwrap();
    assert_eq!(departments.skip_reasons.get("unresolved_reference"), Some(&1));
    Ok(())
}

#[tokio::test]
async fn test_repeated_source_id_keeps_first_mapping() -> Result<()> {
    let source = bucketed(vec![
        (Collection::Institutions, doc! { "_id": "i1", "name": "First", "code": "A" }),
        (Collection::Institutions, doc! { "_id": "i1", "name": "Second", "code": "B" }),
    ]);
    let store = MemoryStore::new();
    let plan = MigrationPlan::select(entities::all(), &[Collection::Institutions])?;
    let mut ctx = MigrationContext::default();

    let report = Executor::new(&store, ExecutorOptions::default()).run(&plan, &source, &mut ctx).await?;
    let institutions = report.entity(Collection::Institutions).unwrap();
    assert_eq!((institutions.migrated, institutions.skipped), (1, 1));
    let rows = store.rows(schema::INSTITUTIONS);
    assert_eq!(rows.len(), 1);
    assert_eq!(ctx.translator.resolve("i1", Collection::Institutions), rows[0].uuid("id"));
    Ok(())
}

/// Fails every insert into one table with the configured error.
struct FailingStore {
    inner: MemoryStore,
    table: &'static str,
    error: StoreError,
}

#[async_trait]
impl DestinationStore for FailingStore {
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        if table == self.table {
            return Err(self.error.clone());
        }
        self.inner.insert(table, row).await
    }

    async fn find(&self, table: &str, criteria: QueryCriteria) -> Result<Vec<Row>, StoreError> {
        self.inner.find(table, criteria).await
    }

    async fn update(&self, table: &str, id: Uuid, changes: &Row) -> Result<u64, StoreError> {
        self.inner.update(table, id, changes).await
    }

    async fn delete(&self, table: &str, criteria: QueryCriteria) -> Result<u64, StoreError> {
        self.inner.delete(table, criteria).await
    }

    async fn truncate(&self, tables: &[&str]) -> Result<(), StoreError> {
        self.inner.truncate(tables).await
    }

    async fn count(&self, table: &str) -> Result<i64, StoreError> {
        self.inner.count(table).await
    }
}

#[tokio::test]
async fn test_store_failures_are_reported_and_cascade() -> Result<()> {
    let source = sample_dump()?;
    let store = FailingStore {
        inner: MemoryStore::new(),
        table: schema::USERS,
        error: StoreError::NotNullViolation("column \"name\"".into()),
    };

    let report = run(&store, &source, ExecutorOptions::default()).await?;
    assert!(report.is_balanced());
    let users = report.entity(Collection::Users).unwrap();
    // u2 is no longer a duplicate once u1's claim on the e-mail is released
    assert_eq!(users.errors, 2);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.errors[0].kind, FailureKind::NotNull);
    assert_eq!(report.errors[0].source_id.as_deref(), Some("u1"));

    // no user landed, so no student can reference one
    let students = report.entity(Collection::Students).unwrap();
    assert_eq!(students.migrated, 0);
    assert_eq!(students.skip_reasons.get("unresolved_reference"), Some(&3));
    Ok(())
}

#[tokio::test]
async fn test_lost_connection_aborts_the_run() -> Result<()> {
    let source = sample_dump()?;
    let store = FailingStore {
        inner: MemoryStore::new(),
        table: schema::INSTITUTIONS,
        error: StoreError::Connection("reset by peer".into()),
    };
    assert!(run(&store, &source, ExecutorOptions::default()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_partial_run_does_not_clear_referenced_tables() -> Result<()> {
    let stale_student = Row::new().with("id", Uuid::new_v4()).with("roll_number", "OLD");
    let assignment = Row::new().with("id", Uuid::new_v4()).with("student_id", stale_student.uuid("id").unwrap());
    let store = MemoryStore::new();
    store.seed(schema::STUDENTS, vec![stale_student]);
    store.seed(schema::MENTOR_ASSIGNMENTS, vec![assignment]);

    let plan = MigrationPlan::select(entities::all(), &[Collection::Students])?;
    let mut ctx = MigrationContext::default();
    Executor::new(&store, ExecutorOptions::default())
        .run(&plan, &CollectionStore::new(), &mut ctx)
        .await?;

    assert_eq!(store.write_calls(), 0);
    assert_eq!(store.rows(schema::STUDENTS).len(), 1);
    assert_eq!(store.rows(schema::MENTOR_ASSIGNMENTS).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_partial_run_of_unreferenced_table_still_clears() -> Result<()> {
    let store = MemoryStore::new();
    store.seed(schema::CALENDARS, vec![Row::new().with("id", Uuid::new_v4())]);

    let plan = MigrationPlan::select(entities::all(), &[Collection::Calendars])?;
    let mut ctx = MigrationContext::default();
    Executor::new(&store, ExecutorOptions::default())
        .run(&plan, &CollectionStore::new(), &mut ctx)
        .await?;

    assert!(store.rows(schema::CALENDARS).is_empty());
    Ok(())
}
