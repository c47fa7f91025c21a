// src/persistence/json_file.rs
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

use serde_json::{from_reader, to_string};

use crate::domain::Store;

/// Loads a store snapshot written by [`write_store`]. A missing file is
/// not an error at boot; callers start empty in that case.
pub fn read_store<P: AsRef<Path>>(path: P) -> Result<Store, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open store file: {}", e))?;
    let reader = BufReader::new(file);
    from_reader(reader).map_err(|e| format!("Failed to parse store file: {}", e))
}

pub fn write_store<P: AsRef<Path>>(path: P, store: &Store) -> Result<(), String> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| format!("Failed to open store file for writing: {}", e))?;

    let json = to_string(store).map_err(|e| format!("Failed to serialize store: {}", e))?;

    file.write_all(json.as_bytes())
        .map_err(|e| format!("Failed to write store file: {}", e))
}
