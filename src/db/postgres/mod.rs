mod activity;
mod purge;

pub use activity::PostgresActivityRepo;
pub use purge::{PostgresConnectionProvider, PostgresPurgeConnection};
