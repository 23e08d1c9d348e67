//! Device-local item state: favorites and read markers.

mod favorites;
mod session;

pub use favorites::FavoriteManager;
pub use session::SessionManager;
