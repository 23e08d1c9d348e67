use serde::{Deserialize, Serialize};

/// State that only ever exists on this device.
///
/// A remote refresh never touches these flags; they are restored from the
/// local caches (`saved`, `read`) when an item is fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    pub favorite: bool,
    pub viewed: bool,
    pub collapsed: bool,
    pub content_expanded: bool,
    pub voted: bool,
}

impl LocalState {
    pub fn new(favorite: bool, viewed: bool) -> Self {
        Self {
            favorite,
            viewed,
            ..Default::default()
        }
    }
}
