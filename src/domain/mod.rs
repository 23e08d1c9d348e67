pub mod item;
pub mod response;
pub mod saved;
pub mod state;
pub mod tree;

pub use item::{Item, ItemKind, RemoteFields};
pub use response::CachedResponse;
pub use saved::SavedStory;
pub use state::LocalState;
pub use tree::ItemTree;
