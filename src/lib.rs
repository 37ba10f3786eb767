use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub mod config;
pub mod formats;
pub mod msg;
pub mod schema;
pub mod state;
pub mod test;
pub mod tournaments;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
