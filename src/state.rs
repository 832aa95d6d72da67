use crate::db::{DbPool, OrmConn};
use crate::pakasir::PakasirClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub pakasir: PakasirClient,
}
