//! `SqliteStore` against a real database file.

use chrono::Utc;
use tempfile::TempDir;

use repolens::db;
use repolens::migrate::migrate_pool;
use repolens::sqlite_store::SqliteStore;
use repolens_core::error::RepolensError;
use repolens_core::models::{
    ChatMessage, Complexity, FileRecord, PipelineStatus, RepoMetadata, Repository, Role,
    StatusField, Summary, SummaryFields, TreeNode, VectorRecord,
};
use repolens_core::store::Store;

async fn open(tmp: &TempDir) -> SqliteStore {
    let pool = db::connect_path(&tmp.path().join("data/test.sqlite"))
        .await
        .unwrap();
    migrate_pool(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn repo(user: &str, stars: u64) -> Repository {
    let meta = RepoMetadata {
        name: "widget".into(),
        stars,
        branches: vec!["main".into(), "dev".into()],
        languages: vec!["Rust".into()],
        ..Default::default()
    };
    Repository::new("https://github.com/acme/widget", user, "acme", meta)
}

fn vector(repo_id: &str, path: &str, idx: i64, v: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: uuid::Uuid::new_v4().to_string(),
        repo_id: repo_id.into(),
        file_id: None,
        path: path.into(),
        chunk_index: idx,
        vector: v,
        preview: format!("{}#{}", path, idx),
        content_hash: "h".into(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    migrate_pool(store.pool()).await.unwrap();
    migrate_pool(store.pool()).await.unwrap();
}

#[tokio::test]
async fn test_upsert_refreshes_metadata_and_keeps_state() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;

    let first = store.upsert_repository(&repo("u1", 1)).await.unwrap();
    assert_eq!(first.branches, ["main", "dev"]);
    store
        .set_status(&first.id, StatusField::Embedding, PipelineStatus::Ready)
        .await
        .unwrap();

    let second = store.upsert_repository(&repo("u1", 7)).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.stars, 7);
    assert_eq!(second.embedding_status, PipelineStatus::Ready);

    let other = store.upsert_repository(&repo("u2", 1)).await.unwrap();
    assert_ne!(other.id, first.id);
}

#[tokio::test]
async fn test_status_fields_are_independent() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let r = store.upsert_repository(&repo("u1", 0)).await.unwrap();

    store
        .set_status(&r.id, StatusField::Ai, PipelineStatus::Failed)
        .await
        .unwrap();
    store
        .set_status(&r.id, StatusField::Structure, PipelineStatus::Ready)
        .await
        .unwrap();

    let loaded = store.get_repository(&r.id).await.unwrap().unwrap();
    assert_eq!(loaded.structure_status, PipelineStatus::Ready);
    assert_eq!(loaded.ai_status, PipelineStatus::Failed);
    assert_eq!(loaded.embedding_status, PipelineStatus::Pending);
}

#[tokio::test]
async fn test_updates_on_missing_repository_are_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;

    let err = store
        .set_status("missing", StatusField::Ai, PipelineStatus::Ready)
        .await
        .unwrap_err();
    assert!(err
        .downcast_ref::<RepolensError>()
        .is_some_and(|e| e.is_not_found()));
    assert!(store.get_repository("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_tree_and_files_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let r = store.upsert_repository(&repo("u1", 0)).await.unwrap();

    let tree = TreeNode::Dir {
        name: "root".into(),
        path: String::new(),
        children: vec![TreeNode::file("b.rs", "b.rs", 3), TreeNode::file("a.rs", "a.rs", 5)],
    };
    store.set_file_tree(&r.id, &tree).await.unwrap();

    for (path, body) in [("b.rs", "fn b"), ("a.rs", "fn a()")] {
        let file = FileRecord::new(&r.id, path, body.len() as u64, ".rs", body.into());
        store.insert_file_record(&file).await.unwrap();
    }

    let loaded = store.get_repository(&r.id).await.unwrap().unwrap();
    assert_eq!(loaded.file_tree, Some(tree));

    let files = store.list_file_records(&r.id).await.unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["b.rs", "a.rs"]);
    assert_eq!(files[1].content, "fn a()");

    assert_eq!(store.delete_file_records(&r.id).await.unwrap(), 2);
    assert!(store.list_file_records(&r.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vectors_keep_order_and_values() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let r = store.upsert_repository(&repo("u1", 0)).await.unwrap();

    store
        .insert_vector(&vector(&r.id, "z.rs", 0, vec![0.5, -1.25, 3.0]))
        .await
        .unwrap();
    store
        .insert_vector(&vector(&r.id, "a.rs", 1, vec![1.0, 0.0, 0.0]))
        .await
        .unwrap();

    let vectors = store.list_vectors(&r.id).await.unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0].path, "z.rs");
    assert_eq!(vectors[0].vector, [0.5, -1.25, 3.0]);
    assert_eq!(vectors[1].chunk_index, 1);
    assert_eq!(store.count_vectors(&r.id).await.unwrap(), 2);

    assert_eq!(store.delete_vectors(&r.id).await.unwrap(), 2);
    assert_eq!(store.count_vectors(&r.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_summary_and_reference() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let r = store.upsert_repository(&repo("u1", 0)).await.unwrap();

    let summary = Summary::from_fields(
        &r.id,
        SummaryFields {
            summary: "Widgets".into(),
            architecture: "Layered".into(),
            complexity: Complexity::Low,
            potential_issues: vec!["no tests".into()],
        },
    );
    store.insert_summary(&summary).await.unwrap();
    store.set_summary_ref(&r.id, &summary.id).await.unwrap();

    let loaded = store.get_summary(&summary.id).await.unwrap().unwrap();
    assert_eq!(loaded.complexity, Complexity::Low);
    assert_eq!(loaded.potential_issues, ["no tests"]);

    let repo = store.get_repository(&r.id).await.unwrap().unwrap();
    assert_eq!(repo.summary_id.as_deref(), Some(summary.id.as_str()));
}

#[tokio::test]
async fn test_second_summary_replaces_first() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let r = store.upsert_repository(&repo("u1", 0)).await.unwrap();

    let fields = |text: &str, complexity| SummaryFields {
        summary: text.into(),
        architecture: "Layered".into(),
        complexity,
        potential_issues: Vec::new(),
    };
    let first = Summary::from_fields(&r.id, fields("first", Complexity::Low));
    store.insert_summary(&first).await.unwrap();
    store.set_summary_ref(&r.id, &first.id).await.unwrap();

    let second = Summary::from_fields(&r.id, fields("second", Complexity::High));
    store.insert_summary(&second).await.unwrap();
    store.set_summary_ref(&r.id, &second.id).await.unwrap();

    assert!(store.get_summary(&first.id).await.unwrap().is_none());
    let loaded = store.get_summary(&second.id).await.unwrap().unwrap();
    assert_eq!(loaded.summary, "second");
    assert_eq!(loaded.complexity, Complexity::High);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries WHERE repo_id = ?")
        .bind(&r.id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    migrate_pool(store.pool()).await.unwrap();
    assert!(store.get_summary(&second.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_chat_turns_append_in_pairs() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let r = store.upsert_repository(&repo("u1", 0)).await.unwrap();

    assert!(store.get_chat_session(&r.id).await.unwrap().is_none());

    let first = store
        .append_chat_turn(
            &r.id,
            &ChatMessage::new(Role::User, "hi"),
            &ChatMessage::new(Role::Assistant, "hello"),
        )
        .await
        .unwrap();
    let second = store
        .append_chat_turn(
            &r.id,
            &ChatMessage::new(Role::User, "what?"),
            &ChatMessage::new(Role::Assistant, "this"),
        )
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["hi", "hello", "what?", "this"]);
    assert_eq!(second.messages[2].role, Role::User);
}
