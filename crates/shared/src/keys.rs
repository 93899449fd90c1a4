//! Key layout of the client-local key-value store.

use crate::domain::RoutineId;

pub const USER_KEY: &str = "user";
pub const FAVORITE_PRODUCTS_KEY: &str = "carefulapp-favorite-products";
pub const ROUTINES_KEY: &str = "carefulapp-routines";
pub const ROUTINE_PROGRESS_PREFIX: &str = "carefulapp-routine-progress-";

pub fn routine_progress_key(routine_id: RoutineId) -> String {
    format!("{ROUTINE_PROGRESS_PREFIX}{}", routine_id.0)
}

pub fn routine_id_from_progress_key(key: &str) -> Option<RoutineId> {
    key.strip_prefix(ROUTINE_PROGRESS_PREFIX)?
        .parse::<i64>()
        .ok()
        .map(RoutineId)
}
