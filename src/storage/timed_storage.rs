//! `TimedStorage` trait (component C7, spec §4.7): `list`/`load`/`store`
//! against a time-indexed backing store, grounded on `stream_storage` and
//! `direct_upload_proto_storage` in the original agent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::Result;

use super::item::{Item, ItemState};

#[async_trait]
pub trait TimedStorage: Send + Sync {
    /// List items whose period intersects `[start, stop)`, metadata only
    /// (`data` left empty; call [`TimedStorage::load`] to fetch bytes).
    async fn list(&self, start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Vec<Item>>;

    /// Fill in `item.data` for an item previously returned by `list`.
    async fn load(&self, item: &mut Item) -> Result<()>;

    /// Store `item` synchronously; most backends prefer `store_async`
    /// instead (see [`super::queue::QueuedAsyncStorage`]).
    async fn store(&self, item: &Item) -> Result<()>;

    /// Best-effort remove. Missing items are not an error (spec §4.7).
    async fn erase(&self, item: &Item) -> Result<()>;
}

/// Backing store used by the reference agent binary and tests: keeps
/// everything in memory, newest last.
#[derive(Default)]
pub struct InMemoryStorage {
    items: Mutex<Vec<Item>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, item: Item) {
        self.items.lock().push(item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }
}

#[async_trait]
impl TimedStorage for InMemoryStorage {
    async fn list(&self, start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Vec<Item>> {
        let items = self.items.lock();
        Ok(items
            .iter()
            .filter(|i| i.period.begin < stop && i.period.end > start)
            .map(|i| {
                let mut meta = i.clone();
                meta.data.clear();
                meta
            })
            .collect())
    }

    async fn load(&self, item: &mut Item) -> Result<()> {
        let items = self.items.lock();
        if let Some(found) = items
            .iter()
            .find(|i| i.period == item.period && i.stream_id == item.stream_id)
        {
            item.data = found.data.clone();
            item.state = ItemState::Loaded;
        }
        Ok(())
    }

    async fn store(&self, item: &Item) -> Result<()> {
        self.items.lock().push(item.clone());
        Ok(())
    }

    async fn erase(&self, item: &Item) -> Result<()> {
        self.items
            .lock()
            .retain(|i| !(i.period == item.period && i.stream_id == item.stream_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::item::Period;
    use crate::wire::enums::{MediaType, UploadCategory};

    fn period(begin_secs: i64, end_secs: i64) -> Period {
        Period::new(
            DateTime::from_timestamp(begin_secs, 0).unwrap(),
            DateTime::from_timestamp(end_secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn list_filters_by_overlap() {
        let storage = InMemoryStorage::new();
        let mut item = Item::new(period(100, 200), "main", UploadCategory::Record, MediaType::Mp4);
        item.data = vec![1, 2, 3];
        storage.seed(item);

        let hits = storage.list(DateTime::from_timestamp(150, 0).unwrap(), DateTime::from_timestamp(300, 0).unwrap()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].data.is_empty(), "list() should not populate data");

        let misses = storage.list(DateTime::from_timestamp(300, 0).unwrap(), DateTime::from_timestamp(400, 0).unwrap()).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn load_populates_data() {
        let storage = InMemoryStorage::new();
        let mut seeded = Item::new(period(0, 10), "main", UploadCategory::Record, MediaType::Mp4);
        seeded.data = vec![9, 9, 9];
        storage.seed(seeded.clone());

        let mut lookup = Item::new(period(0, 10), "main", UploadCategory::Record, MediaType::Mp4);
        storage.load(&mut lookup).await.unwrap();
        assert_eq!(lookup.data, vec![9, 9, 9]);
        assert_eq!(lookup.state, ItemState::Loaded);
    }
}
