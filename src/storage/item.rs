//! The unit of storage (component C7, spec §4.7): one recorded clip or
//! snapshot, identified by its time span.

use chrono::{DateTime, Utc};

use crate::wire::enums::{MediaType, UploadCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Period { begin, end }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.begin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Loaded,
    Stored,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub period: Period,
    pub stream_id: String,
    pub category: UploadCategory,
    pub media_type: MediaType,
    pub data: Vec<u8>,
    pub state: ItemState,
}

impl Item {
    pub fn new(period: Period, stream_id: impl Into<String>, category: UploadCategory, media_type: MediaType) -> Self {
        Item {
            period,
            stream_id: stream_id.into(),
            category,
            media_type,
            data: Vec::new(),
            state: ItemState::Pending,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.period.end > self.period.begin && category_is_valid(self.category) && media_type_is_valid(self.media_type)
    }
}

fn category_is_valid(c: UploadCategory) -> bool {
    c.is_valid()
}

fn media_type_is_valid(m: MediaType) -> bool {
    m.is_valid()
}
