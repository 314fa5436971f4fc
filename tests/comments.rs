// End-to-end tests for the comment store, reaction ledger, and application
// service, running against the in-memory SQLite backend.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use comment_service::error::{AppError, AppResult};
use comment_service::infrastructure::cursor::decode_cursor;
use comment_service::infrastructure::events::EventSink;
use comment_service::infrastructure::sqlite::SqliteCommentStore;
use comment_service::infrastructure::store::{
    CommentStore, NewComment, ReactionLedger, DEFAULT_PAGE_SIZE,
};
use comment_service::models::comment::{EntityType, ReactionKind};
use comment_service::models::events::CommentEvent;
use comment_service::services::{CommentService, CreateComment};

async fn store() -> Arc<SqliteCommentStore> {
    Arc::new(SqliteCommentStore::new_in_memory().await.unwrap())
}

fn new_comment(
    entity_id: i64,
    entity_type: EntityType,
    author_id: i64,
    text: &str,
    parent_id: Option<i64>,
) -> NewComment {
    NewComment {
        entity_id,
        entity_type,
        author_id,
        author_username: format!("user{}", author_id),
        author_avatar: None,
        text: text.to_string(),
        parent_id,
    }
}

fn service_with(
    store: Arc<SqliteCommentStore>,
    events: Option<Arc<dyn EventSink>>,
) -> CommentService {
    CommentService::new(store.clone(), store, events, DEFAULT_PAGE_SIZE)
}

fn create_request(
    entity_id: i64,
    entity_type: EntityType,
    author_id: i64,
    text: &str,
    parent_id: Option<i64>,
) -> CreateComment {
    CreateComment {
        entity_id,
        entity_type,
        author_id,
        author_username: format!("user{}", author_id),
        author_avatar: None,
        text: text.to_string(),
        parent_id,
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<CommentEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &CommentEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn publish(&self, _event: &CommentEvent) -> AppResult<()> {
        Err(AppError::EventPublishError("sink offline".to_string()))
    }
}

#[tokio::test]
async fn test_create_assigns_identity_and_defaults() {
    let store = store().await;

    let first = store
        .create(new_comment(1, EntityType::Post, 10, "first", None))
        .await
        .unwrap();
    let second = store
        .create(new_comment(1, EntityType::Post, 11, "second", None))
        .await
        .unwrap();

    assert!(first.id > 0);
    assert!(second.id > first.id);
    assert_eq!(first.rating, 0);
    assert!(first.is_positive);
    assert!(first.time_created > 0);
    assert_eq!(first.time_created, first.time_updated);

    let fetched = store.get_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.text, "first");
    assert_eq!(fetched.author_username, "user10");
    assert_eq!(fetched.entity_type, EntityType::Post);
    assert!(fetched.parent_id.is_none());

    assert!(store.get_by_id(999_999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_root_listing_excludes_replies_and_other_entities() {
    let store = store().await;

    let root_a = store
        .create(new_comment(1, EntityType::Post, 10, "root a", None))
        .await
        .unwrap();
    let root_b = store
        .create(new_comment(1, EntityType::Post, 11, "root b", None))
        .await
        .unwrap();
    store
        .create(new_comment(1, EntityType::Post, 12, "reply", Some(root_a.id)))
        .await
        .unwrap();
    // Same id, different entity kind: a separate thread.
    store
        .create(new_comment(1, EntityType::Game, 13, "game root", None))
        .await
        .unwrap();

    let (roots, next_cursor) = store
        .list_root_comments(1, EntityType::Post, None, DEFAULT_PAGE_SIZE)
        .await
        .unwrap();

    assert_eq!(
        roots.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![root_a.id, root_b.id]
    );
    assert!(roots.iter().all(|c| c.parent_id.is_none()));
    assert!(next_cursor.is_none());
}

#[tokio::test]
async fn test_pagination_fetches_limit_plus_one() {
    let store = store().await;

    let mut ids = Vec::new();
    for i in 0..6 {
        let comment = store
            .create(new_comment(2, EntityType::Game, 20, &format!("c{}", i), None))
            .await
            .unwrap();
        ids.push(comment.id);
    }

    let (page, cursor) = store
        .list_root_comments(2, EntityType::Game, None, DEFAULT_PAGE_SIZE)
        .await
        .unwrap();
    assert_eq!(page.len(), 5);
    let cursor = cursor.expect("a sixth row must produce a cursor");
    assert_eq!(decode_cursor(&cursor), Some(page[4].id));
    assert_eq!(page.iter().map(|c| c.id).collect::<Vec<_>>(), &ids[..5]);

    let (rest, next) = store
        .list_root_comments(2, EntityType::Game, Some(&cursor), DEFAULT_PAGE_SIZE)
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, ids[5]);
    assert!(next.is_none());
}

#[tokio::test]
async fn test_malformed_cursor_falls_back_to_first_page() {
    let store = store().await;

    for i in 0..3 {
        store
            .create(new_comment(3, EntityType::Post, 30, &format!("c{}", i), None))
            .await
            .unwrap();
    }

    let (from_start, _) = store
        .list_root_comments(3, EntityType::Post, None, DEFAULT_PAGE_SIZE)
        .await
        .unwrap();
    let (from_garbage, _) = store
        .list_root_comments(3, EntityType::Post, Some("!!not-a-cursor!!"), DEFAULT_PAGE_SIZE)
        .await
        .unwrap();

    assert_eq!(
        from_start.iter().map(|c| c.id).collect::<Vec<_>>(),
        from_garbage.iter().map(|c| c.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_children_listing_and_counts() {
    let store = store().await;

    let root = store
        .create(new_comment(4, EntityType::Post, 40, "root", None))
        .await
        .unwrap();
    assert_eq!(store.count_children(root.id).await.unwrap(), 0);

    let mut reply_ids = Vec::new();
    for i in 0..3 {
        let reply = store
            .create(new_comment(4, EntityType::Post, 41, &format!("r{}", i), Some(root.id)))
            .await
            .unwrap();
        reply_ids.push(reply.id);
    }

    assert_eq!(store.count_children(root.id).await.unwrap(), 3);
    // Direct children only, not the subtree.
    let nested = store
        .create(new_comment(4, EntityType::Post, 42, "nested", Some(reply_ids[0])))
        .await
        .unwrap();
    assert_eq!(store.count_children(root.id).await.unwrap(), 3);
    assert_eq!(store.count_children(nested.id).await.unwrap(), 0);

    let (children, next) = store
        .list_children(root.id, None, DEFAULT_PAGE_SIZE)
        .await
        .unwrap();
    assert_eq!(children.iter().map(|c| c.id).collect::<Vec<_>>(), reply_ids);
    assert!(next.is_none());

    // All depths count for the entity: root + 3 replies + 1 nested.
    assert_eq!(store.count_by_entity(4, EntityType::Post).await.unwrap(), 5);
}

#[tokio::test]
async fn test_reaction_lifecycle_keeps_rating_consistent() {
    let store = store().await;
    let comment = store
        .create(new_comment(5, EntityType::Game, 50, "rate me", None))
        .await
        .unwrap();
    let user = 500;

    store
        .set_user_reaction(comment.id, user, Some(ReactionKind::Like))
        .await
        .unwrap();
    assert_eq!(
        store.get_user_reaction(comment.id, user).await.unwrap(),
        Some(ReactionKind::Like)
    );
    let after_like = store.get_by_id(comment.id).await.unwrap().unwrap();
    assert_eq!(after_like.rating, 1);
    assert!(after_like.is_positive);

    // Idempotent: the same reaction again leaves one row and the rating alone.
    store
        .set_user_reaction(comment.id, user, Some(ReactionKind::Like))
        .await
        .unwrap();
    let after_repeat = store.get_by_id(comment.id).await.unwrap().unwrap();
    assert_eq!(after_repeat.rating, 1);

    store
        .set_user_reaction(comment.id, user, Some(ReactionKind::Dislike))
        .await
        .unwrap();
    assert_eq!(
        store.get_user_reaction(comment.id, user).await.unwrap(),
        Some(ReactionKind::Dislike)
    );
    let after_switch = store.get_by_id(comment.id).await.unwrap().unwrap();
    assert_eq!(after_switch.rating, -1);
    assert!(!after_switch.is_positive);

    store.set_user_reaction(comment.id, user, None).await.unwrap();
    assert_eq!(store.get_user_reaction(comment.id, user).await.unwrap(), None);
    let after_clear = store.get_by_id(comment.id).await.unwrap().unwrap();
    assert_eq!(after_clear.rating, 0);
    assert!(after_clear.is_positive);
}

#[tokio::test]
async fn test_rating_matches_direct_count_over_ledger_rows() {
    let store = store().await;
    let comment = store
        .create(new_comment(6, EntityType::Post, 60, "popular", None))
        .await
        .unwrap();

    for user in [601, 602, 603] {
        store
            .set_user_reaction(comment.id, user, Some(ReactionKind::Like))
            .await
            .unwrap();
    }
    for user in [604, 605] {
        store
            .set_user_reaction(comment.id, user, Some(ReactionKind::Dislike))
            .await
            .unwrap();
    }

    let state = store.get_by_id(comment.id).await.unwrap().unwrap();
    assert_eq!(state.rating, 1);
    assert!(state.is_positive);

    // One liker flips: 2 likes vs 3 dislikes.
    store
        .set_user_reaction(comment.id, 603, Some(ReactionKind::Dislike))
        .await
        .unwrap();
    let state = store.get_by_id(comment.id).await.unwrap().unwrap();
    assert_eq!(state.rating, -1);
    assert!(!state.is_positive);

    let mut likes = 0;
    let mut dislikes = 0;
    for user in [601, 602, 603, 604, 605] {
        match store.get_user_reaction(comment.id, user).await.unwrap() {
            Some(ReactionKind::Like) => likes += 1,
            Some(ReactionKind::Dislike) => dislikes += 1,
            None => {}
        }
    }
    assert_eq!(state.rating, likes - dislikes);
    assert_eq!(state.is_positive, likes >= dislikes);
}

#[tokio::test]
async fn test_delete_by_entity_cascades_comments_and_reactions() {
    let store = store().await;

    let root = store
        .create(new_comment(7, EntityType::Game, 70, "root", None))
        .await
        .unwrap();
    let reply = store
        .create(new_comment(7, EntityType::Game, 71, "reply", Some(root.id)))
        .await
        .unwrap();
    store
        .set_user_reaction(reply.id, 700, Some(ReactionKind::Like))
        .await
        .unwrap();

    // Same numeric id under a different kind, and a different game entirely:
    // both must survive.
    let other_kind = store
        .create(new_comment(7, EntityType::Post, 72, "post thread", None))
        .await
        .unwrap();
    let other_game = store
        .create(new_comment(8, EntityType::Game, 73, "other game", None))
        .await
        .unwrap();

    let deleted = store.delete_by_entity(7, EntityType::Game).await.unwrap();
    assert_eq!(deleted, 2);

    assert!(store.get_by_id(root.id).await.unwrap().is_none());
    assert!(store.get_by_id(reply.id).await.unwrap().is_none());
    assert_eq!(store.get_user_reaction(reply.id, 700).await.unwrap(), None);
    assert_eq!(store.count_by_entity(7, EntityType::Game).await.unwrap(), 0);

    assert!(store.get_by_id(other_kind.id).await.unwrap().is_some());
    assert!(store.get_by_id(other_game.id).await.unwrap().is_some());

    // Deleting again is a no-op.
    assert_eq!(store.delete_by_entity(7, EntityType::Game).await.unwrap(), 0);
}

#[tokio::test]
async fn test_service_enriches_listings_for_the_viewer() {
    let store = store().await;
    let service = service_with(store.clone(), None);
    let viewer = 900;

    let root = store
        .create(new_comment(9, EntityType::Post, 90, "root", None))
        .await
        .unwrap();
    store
        .create(new_comment(9, EntityType::Post, 91, "reply", Some(root.id)))
        .await
        .unwrap();
    store
        .set_user_reaction(root.id, viewer, Some(ReactionKind::Like))
        .await
        .unwrap();

    let page = service
        .list_comments(9, EntityType::Post, None, Some(viewer))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());

    let view = &page.items[0];
    assert_eq!(view.id, root.id);
    assert_eq!(view.children_count, 1);
    assert!(view.is_liked_by_me);
    assert!(!view.is_disliked_by_me);
    assert_eq!(view.rating, 1);
    assert_eq!(view.author.username, "user90");
    assert_eq!(view.entity_type, EntityType::Post);

    // Anonymous viewers never get reaction flags.
    let anonymous = service
        .list_comments(9, EntityType::Post, None, None)
        .await
        .unwrap();
    assert!(!anonymous.items[0].is_liked_by_me);
    assert!(!anonymous.items[0].is_disliked_by_me);
}

#[tokio::test]
async fn test_service_pagination_scenario() {
    let store = store().await;
    let service = service_with(store.clone(), None);

    for i in 0..6 {
        service
            .create_comment(create_request(10, EntityType::Post, 100, &format!("c{}", i), None))
            .await
            .unwrap();
    }

    let first = service
        .list_comments(10, EntityType::Post, None, None)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 5);
    assert!(first.has_more);
    let cursor = first.next_cursor.clone().unwrap();
    assert_eq!(decode_cursor(&cursor), Some(first.items[4].id));

    let second = service
        .list_comments(10, EntityType::Post, Some(&cursor), None)
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert!(!second.has_more);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_service_rejects_invalid_text() {
    let store = store().await;
    let service = service_with(store.clone(), None);

    let empty = service
        .create_comment(create_request(11, EntityType::Game, 110, "", None))
        .await;
    assert!(matches!(empty, Err(AppError::Validation(_))));

    let blank = service
        .create_comment(create_request(11, EntityType::Game, 110, "   ", None))
        .await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let oversized = "x".repeat(10_001);
    let too_long = service
        .create_comment(create_request(11, EntityType::Game, 110, &oversized, None))
        .await;
    assert!(matches!(too_long, Err(AppError::Validation(_))));

    // Nothing was persisted.
    assert_eq!(store.count_by_entity(11, EntityType::Game).await.unwrap(), 0);
}

#[tokio::test]
async fn test_service_create_emits_created_and_count_events() {
    let store = store().await;
    let sink = Arc::new(RecordingSink::default());
    let service = service_with(store.clone(), Some(sink.clone()));

    let root = service
        .create_comment(create_request(12, EntityType::Post, 120, "root", None))
        .await
        .unwrap();
    let _reply = service
        .create_comment(create_request(12, EntityType::Post, 121, "reply", Some(root.id)))
        .await
        .unwrap();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 4);

    match &events[0] {
        CommentEvent::Created(e) => {
            assert_eq!(e.comment_id, root.id);
            assert_eq!(e.entity_id, 12);
            assert_eq!(e.entity_type, EntityType::Post);
            assert_eq!(e.author_id, 120);
            assert!(e.parent_id.is_none());
        }
        other => panic!("expected created event, got {:?}", other),
    }
    match &events[1] {
        CommentEvent::CountUpdated(e) => {
            assert_eq!(e.entity_id, 12);
            assert_eq!(e.comment_count, 1);
        }
        other => panic!("expected count event, got {:?}", other),
    }
    match &events[2] {
        CommentEvent::Created(e) => assert_eq!(e.parent_id, Some(root.id)),
        other => panic!("expected created event, got {:?}", other),
    }
    match &events[3] {
        CommentEvent::CountUpdated(e) => assert_eq!(e.comment_count, 2),
        other => panic!("expected count event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_service_create_survives_sink_failure() {
    let store = store().await;
    let service = service_with(store.clone(), Some(Arc::new(FailingSink)));

    let view = service
        .create_comment(create_request(13, EntityType::Game, 130, "still works", None))
        .await
        .unwrap();

    assert!(store.get_by_id(view.id).await.unwrap().is_some());
    assert_eq!(store.count_by_entity(13, EntityType::Game).await.unwrap(), 1);
}

#[tokio::test]
async fn test_service_set_reaction_reloads_the_comment() {
    let store = store().await;
    let service = service_with(store.clone(), None);
    let viewer = 1400;

    let created = service
        .create_comment(create_request(14, EntityType::Post, 140, "react", None))
        .await
        .unwrap();

    let liked = service
        .set_reaction(created.id, viewer, Some(ReactionKind::Like))
        .await
        .unwrap();
    assert_eq!(liked.rating, 1);
    assert!(liked.is_liked_by_me);
    assert!(!liked.is_disliked_by_me);

    let cleared = service.set_reaction(created.id, viewer, None).await.unwrap();
    assert_eq!(cleared.rating, 0);
    assert!(!cleared.is_liked_by_me);

    let missing = service
        .set_reaction(999_999, viewer, Some(ReactionKind::Like))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_thread_scenario_end_to_end() {
    let store = store().await;
    let service = service_with(store.clone(), None);
    let user = 1500;

    // Root comment on entity 1.
    let a = service
        .create_comment(create_request(1, EntityType::Post, 150, "root a", None))
        .await
        .unwrap();
    assert_eq!(store.count_children(a.id).await.unwrap(), 0);

    // Reply inherits the entity binding.
    let b = service
        .create_comment(create_request(1, EntityType::Post, 151, "reply b", Some(a.id)))
        .await
        .unwrap();
    assert_eq!(store.count_children(a.id).await.unwrap(), 1);

    let children = service.list_children(a.id, None, None).await.unwrap();
    assert_eq!(children.items.len(), 1);
    assert_eq!(children.items[0].id, b.id);
    assert!(!children.has_more);

    let liked = service
        .set_reaction(b.id, user, Some(ReactionKind::Like))
        .await
        .unwrap();
    assert_eq!(liked.rating, 1);
    assert!(liked.is_positive);
    assert_eq!(
        store.get_user_reaction(b.id, user).await.unwrap(),
        Some(ReactionKind::Like)
    );

    let disliked = service
        .set_reaction(b.id, user, Some(ReactionKind::Dislike))
        .await
        .unwrap();
    assert_eq!(disliked.rating, -1);
    assert!(!disliked.is_positive);

    store.delete_by_entity(1, EntityType::Post).await.unwrap();
    assert!(store.get_by_id(a.id).await.unwrap().is_none());
    assert!(store.get_by_id(b.id).await.unwrap().is_none());
    assert_eq!(store.get_user_reaction(b.id, user).await.unwrap(), None);
}
