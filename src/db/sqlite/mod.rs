mod activity;
mod purge;

pub use activity::SqliteActivityRepo;
pub use purge::{SqliteConnectionProvider, SqlitePurgeConnection};
