// src/directory.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::domain::core::{ListingId, UserId};

/// What the auction core needs to know about a listing. Listings are
/// managed elsewhere; this is a read-only fact source used at auction
/// creation and for notification text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingInfo {
    pub id: ListingId,
    pub owner: UserId,
    pub title: String,
}

pub trait ListingDirectory: Send + Sync {
    fn get(&self, id: ListingId) -> Option<ListingInfo>;
}

/// Directory backed by a fixed set of listings, seeded from a JSON file at
/// boot or built directly in tests.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    listings: HashMap<ListingId, ListingInfo>,
}

impl StaticDirectory {
    pub fn new(listings: impl IntoIterator<Item = ListingInfo>) -> Self {
        StaticDirectory {
            listings: listings.into_iter().map(|l| (l.id, l)).collect(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let file = File::open(&path).map_err(|e| format!("Failed to open listings file: {}", e))?;
        let listings: Vec<ListingInfo> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| format!("Failed to parse listings file: {}", e))?;
        Ok(Self::new(listings))
    }
}

impl ListingDirectory for StaticDirectory {
    fn get(&self, id: ListingId) -> Option<ListingInfo> {
        self.listings.get(&id).cloned()
    }
}
