// Core infrastructure modules
pub mod cursor;     // Opaque pagination cursor codec
pub mod store;      // Comment store and reaction ledger interfaces
pub mod postgres;   // PostgreSQL store implementation
pub mod sqlite;     // SQLite store implementation (in-memory testing)
pub mod events;     // Event sink and entity-deleted consumer
pub mod middleware; // Viewer context and authentication

// Re-export core infrastructure components
pub use cursor::{decode_cursor, encode_cursor};
pub use events::{run_entity_deleted_consumer, EventSink, NatsEventSink};
pub use middleware::{viewer_context_middleware, JwtAuthenticator, UserIdentity, Vc, ViewerContext};
pub use postgres::PostgresCommentStore;
pub use sqlite::SqliteCommentStore;
pub use store::{CommentStore, NewComment, ReactionLedger, DEFAULT_PAGE_SIZE};
