use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{DonationNewCmd, Engine, EngineError, MoneyCents, ProjectNewCmd, ProjectUpdateCmd};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    seed_users(&db).await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, DatabaseConnection, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    seed_users(&db).await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();

    (engine, db, path)
}

async fn seed_users(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    for (username, superuser) in [("alice", false), ("bob", false), ("root", true)] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password, superuser) VALUES (?, ?, ?)",
            vec![username.into(), "password".into(), superuser.into()],
        ))
        .await
        .unwrap();
    }
}

async fn invested_sums(db: &DatabaseConnection) -> (i64, i64) {
    let backend = db.get_database_backend();
    let mut sums = [0i64; 2];
    for (i, table) in ["projects", "donations"].iter().enumerate() {
        let row = db
            .query_one(Statement::from_string(
                backend,
                format!("SELECT COALESCE(SUM(invested_minor), 0) AS sum FROM {table}"),
            ))
            .await
            .unwrap()
            .unwrap();
        sums[i] = row.try_get("", "sum").unwrap();
    }
    (sums[0], sums[1])
}

#[tokio::test]
async fn donation_fills_projects_oldest_first() {
    let (engine, _db) = engine_with_db().await;

    let first = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    let second = engine
        .create_project(ProjectNewCmd::new("Vet care", "Vaccinations", 50))
        .await
        .unwrap();

    let donation = engine
        .create_donation(DonationNewCmd::new("alice", 120))
        .await
        .unwrap();
    assert!(donation.fully_invested());

    let first = engine.project(first.id).await.unwrap();
    assert!(first.fully_invested());
    assert_eq!(first.invested, MoneyCents::new(100));
    assert!(first.closed_at.is_some());

    let second = engine.project(second.id).await.unwrap();
    assert!(!second.fully_invested());
    assert_eq!(second.invested, MoneyCents::new(20));
    assert!(second.closed_at.is_none());
}

#[tokio::test]
async fn leftover_carries_forward_to_new_project() {
    let (engine, _db) = engine_with_db().await;

    let donation = engine
        .create_donation(DonationNewCmd::new("alice", 30).comment("for whoever needs it"))
        .await
        .unwrap();
    assert_eq!(donation.invested, MoneyCents::ZERO);

    let project = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    assert_eq!(project.invested, MoneyCents::new(30));
    assert!(!project.fully_invested());

    let (mine, _) = engine.user_donations("alice", 10, None).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine[0].fully_invested());
}

#[tokio::test]
async fn project_fills_across_donations_in_order() {
    let (engine, _db) = engine_with_db().await;

    engine
        .create_donation(DonationNewCmd::new("alice", 40))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("bob", 70))
        .await
        .unwrap();

    let project = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    assert!(project.fully_invested());
    assert!(project.closed_at.is_some());

    let (donations, _) = engine.list_donations(10, None).await.unwrap();
    assert_eq!(donations.len(), 2);
    assert!(donations[0].fully_invested());
    assert_eq!(donations[1].invested, MoneyCents::new(60));
    assert_eq!(donations[1].available(), MoneyCents::new(10));
}

#[tokio::test]
async fn closed_project_is_never_touched_again() {
    let (engine, _db) = engine_with_db().await;

    let project = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("alice", 100))
        .await
        .unwrap();

    let closed = engine.project(project.id).await.unwrap();
    assert!(closed.fully_invested());
    let closed_at = closed.closed_at.unwrap();

    let later = engine
        .create_donation(DonationNewCmd::new("bob", 50))
        .await
        .unwrap();
    assert_eq!(later.invested, MoneyCents::ZERO);

    let unchanged = engine.project(project.id).await.unwrap();
    assert_eq!(unchanged.invested, MoneyCents::new(100));
    assert_eq!(unchanged.closed_at, Some(closed_at));
}

#[tokio::test]
async fn invested_totals_stay_equal_across_interleaved_creations() {
    let (engine, db) = engine_with_db().await;

    engine
        .create_donation(DonationNewCmd::new("alice", 35))
        .await
        .unwrap();
    engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 20))
        .await
        .unwrap();
    engine
        .create_project(ProjectNewCmd::new("Vet care", "Vaccinations", 40))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("bob", 15))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("alice", 200))
        .await
        .unwrap();
    engine
        .create_project(ProjectNewCmd::new("Food", "Winter stock", 75))
        .await
        .unwrap();

    let (projects_sum, donations_sum) = invested_sums(&db).await;
    assert_eq!(projects_sum, donations_sum);
    // 20 + 40 + 75: every project filled from the backlog.
    assert_eq!(projects_sum, 135);
}

#[tokio::test]
async fn concurrent_donations_close_project_exactly_once() {
    let (engine, db, path) = engine_with_file_db().await;
    let engine = Arc::new(engine);

    let project = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            engine
                .create_donation(DonationNewCmd::new("alice", 25))
                .await
        });
    }

    let mut donations = Vec::new();
    while let Some(result) = tasks.join_next().await {
        donations.push(result.unwrap().unwrap());
    }

    assert_eq!(donations.len(), 4);
    for donation in &donations {
        assert!(donation.fully_invested());
    }

    let project = engine.project(project.id).await.unwrap();
    assert!(project.fully_invested());
    assert_eq!(project.invested, MoneyCents::new(100));

    let (projects_sum, donations_sum) = invested_sums(&db).await;
    assert_eq!(projects_sum, 100);
    assert_eq!(donations_sum, 100);

    drop(db);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn create_donation_validates_user_and_amount() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_donation(DonationNewCmd::new("nobody", 10))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("user not exists".to_string()));

    let err = engine
        .create_donation(DonationNewCmd::new("alice", 0))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("donation amount must be > 0".to_string())
    );
}

#[tokio::test]
async fn duplicate_project_names_are_rejected() {
    let (engine, _db) = engine_with_db().await;

    engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    let err = engine
        .create_project(ProjectNewCmd::new("shelter", "Another roof", 50))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("shelter".to_string()));
}

#[tokio::test]
async fn update_project_guards_and_closes_on_matching_target() {
    let (engine, _db) = engine_with_db().await;

    let project = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("alice", 40))
        .await
        .unwrap();

    // Cannot shrink below what is already invested.
    let err = engine
        .update_project(ProjectUpdateCmd::new(project.id).target_minor(30))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    // Matching the invested amount closes the project.
    let updated = engine
        .update_project(ProjectUpdateCmd::new(project.id).target_minor(40))
        .await
        .unwrap();
    assert!(updated.fully_invested());
    assert!(updated.closed_at.is_some());

    // Closed projects are immutable.
    let err = engine
        .update_project(ProjectUpdateCmd::new(project.id).name("New roof"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidEntityState(_)));
}

#[tokio::test]
async fn update_project_renames_and_keeps_names_unique() {
    let (engine, _db) = engine_with_db().await;

    engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    let second = engine
        .create_project(ProjectNewCmd::new("Vet care", "Vaccinations", 50))
        .await
        .unwrap();

    let err = engine
        .update_project(ProjectUpdateCmd::new(second.id).name("SHELTER"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("SHELTER".to_string()));

    let updated = engine
        .update_project(
            ProjectUpdateCmd::new(second.id)
                .name("Clinic")
                .description("Vaccinations and surgery"),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Clinic");
    assert_eq!(updated.description, "Vaccinations and surgery");
}

#[tokio::test]
async fn delete_project_only_before_any_investment() {
    let (engine, _db) = engine_with_db().await;

    let empty = engine
        .create_project(ProjectNewCmd::new("Shelter", "A roof for the cats", 100))
        .await
        .unwrap();
    let deleted = engine.delete_project(empty.id).await.unwrap();
    assert_eq!(deleted.id, empty.id);
    assert_eq!(
        engine.project(empty.id).await.unwrap_err(),
        EngineError::KeyNotFound("project not exists".to_string())
    );

    let funded = engine
        .create_project(ProjectNewCmd::new("Vet care", "Vaccinations", 100))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("alice", 10))
        .await
        .unwrap();
    let err = engine.delete_project(funded.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidEntityState(_)));

    engine
        .create_donation(DonationNewCmd::new("bob", 90))
        .await
        .unwrap();
    let err = engine.delete_project(funded.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidEntityState(_)));
}

#[tokio::test]
async fn project_listing_pages_oldest_first() {
    let (engine, _db) = engine_with_db().await;

    let mut ids = Vec::new();
    for (name, target) in [("Shelter", 100), ("Vet care", 50), ("Food", 75)] {
        let project = engine
            .create_project(ProjectNewCmd::new(name, "…", target))
            .await
            .unwrap();
        ids.push(project.id);
    }

    let (first_page, cursor) = engine.list_projects(2, None).await.unwrap();
    assert_eq!(
        first_page.iter().map(|p| p.id).collect::<Vec<_>>(),
        ids[..2]
    );
    let cursor = cursor.unwrap();

    let (second_page, cursor) = engine.list_projects(2, Some(&cursor)).await.unwrap();
    assert_eq!(
        second_page.iter().map(|p| p.id).collect::<Vec<_>>(),
        ids[2..]
    );
    assert!(cursor.is_none());

    let err = engine.list_projects(2, Some("garbage!")).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
}

#[tokio::test]
async fn user_donations_only_lists_own() {
    let (engine, _db) = engine_with_db().await;

    engine
        .create_donation(DonationNewCmd::new("alice", 10))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("bob", 20))
        .await
        .unwrap();
    engine
        .create_donation(DonationNewCmd::new("alice", 30))
        .await
        .unwrap();

    let (mine, _) = engine.user_donations("alice", 10, None).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|d| d.user_id == "alice"));

    let (all, _) = engine.list_donations(10, None).await.unwrap();
    assert_eq!(all.len(), 3);
}
