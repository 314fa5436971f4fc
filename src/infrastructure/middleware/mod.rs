pub mod auth;   // Bearer-token decoding and the viewer-context middleware
pub mod viewer; // ViewerContext and the Vc extractor

pub use auth::{viewer_context_middleware, JwtAuthenticator};
pub use viewer::{UserIdentity, Vc, ViewerContext};
