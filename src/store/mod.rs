//! Entity Store drivers implementing [`crate::repository::Repository`].

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

use std::collections::HashMap;
use uuid::Uuid;

/// Reorders `records` to follow `ids`, dropping ids that were not found.
pub(crate) fn order_by_ids<T>(ids: &[Uuid], records: Vec<T>, key: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut by_id: HashMap<Uuid, T> = records.into_iter().map(|r| (key(&r), r)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
