use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::forum::ThreadStore;
use crate::menu::WeekMenuCache;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    /// One cache service per process; it owns the cache file guards.
    pub menu: Arc<WeekMenuCache>,
    pub threads: ThreadStore,
}
