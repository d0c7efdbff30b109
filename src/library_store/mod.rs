mod albums;
mod artists;
mod clock;
mod delta;
mod error;
mod favorites;
mod models;
mod playlists;
mod schema;
mod songs;
mod store;
mod trait_def;
mod users;

pub use clock::{wall_clock_nanos, MonotonicClock};
pub use delta::{ChangeFilter, FavoritePlaylistFilter, LibraryDelta, PlaylistFilter};
pub use error::{StoreError, StoreResult};
pub use models::*;
pub use schema::LIBRARY_VERSIONED_SCHEMAS;
pub use store::{LibraryTx, SqliteLibraryStore};
pub use trait_def::LibraryStore;
pub use users::PasswordCredentials;
