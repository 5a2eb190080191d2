pub mod api;
pub mod editor;
pub mod error;
pub mod history;
pub mod key;
pub mod lookup;
pub mod mention;
pub mod position;

pub use api::{ApiClient, ApiError, CreatePost, Paged, PostResponse, Session};
pub use editor::{BlockType, Composer, ComposerConfig};
pub use error::EditError;
pub use key::{Key, parse_keys};
pub use lookup::{Entity, EntityLookup, LookupError, MatchMode, RemoteLookup, StaticLookup};
pub use mention::{KeyOutcome, LookupRequest, MentionConfig, MentionResolver, ResolverState, Suggestion};
pub use position::{Position, Selection};
