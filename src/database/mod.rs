/*!
 * SQLite-backed artifact manifest.
 *
 * Records metadata (source provider, content hash, size, creation time) for
 * every artifact the cache persists.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::ArtifactRecord;
pub use repository::Repository;
