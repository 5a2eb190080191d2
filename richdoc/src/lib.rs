pub mod codec;
pub mod document;
pub mod markdown;
pub mod media;
pub mod render;

pub use codec::{DecodeError, deserialize, serialize, try_deserialize};
pub use document::{Block, Document, Inline, ListItem, Mark, MarkKind, Marks};
pub use markdown::from_markdown;
pub use render::{RenderOptions, Renderer};
