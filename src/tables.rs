use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    domain::{TableMapping, validate_mappings, validate_total_tables},
    id::new_table_token,
    state::{StoreError, TABLE_MAPPING_FILE, init_json_file, load_json, save_json},
};

/// On-disk shape: `{ "<token>": <table_number> }`.
type PersistedMapping = BTreeMap<String, u32>;

/// Token to table-number registry backed by a single JSON object file.
#[derive(Debug)]
pub struct TableRegistry {
    path: PathBuf,
}

impl TableRegistry {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(TABLE_MAPPING_FILE);
        init_json_file(&path, &PersistedMapping::new())?;
        Ok(Self { path })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces every mapping with `total_tables` freshly tokenized tables.
    pub fn configure(&mut self, total_tables: i64) -> Result<Vec<TableMapping>, StoreError> {
        let total_tables = validate_total_tables(total_tables)?;

        let mut mapping = PersistedMapping::new();
        for table_number in 1..=total_tables {
            let token = loop {
                let token = new_table_token(table_number);
                if !mapping.contains_key(&token) {
                    break token;
                }
            };
            mapping.insert(token, table_number);
        }

        save_json(&self.path, &mapping)?;
        info!(total_tables, "tables configured");
        Ok(to_sorted_list(mapping))
    }

    /// Replaces every mapping with caller-provided pairs.
    pub fn replace_all(
        &mut self,
        mappings: Vec<TableMapping>,
    ) -> Result<Vec<TableMapping>, StoreError> {
        let mappings = validate_mappings(mappings)?;
        let persisted: PersistedMapping = mappings
            .iter()
            .map(|m| (m.token.clone(), m.table_number))
            .collect();

        save_json(&self.path, &persisted)?;
        info!(total_tables = mappings.len(), "table mappings replaced");
        Ok(mappings)
    }

    pub fn lookup(&self, token: &str) -> Result<Option<u32>, StoreError> {
        Ok(self.load()?.get(token).copied())
    }

    pub fn token_for_table(&self, table_number: u32) -> Result<Option<String>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|(_, n)| *n == table_number)
            .map(|(token, _)| token))
    }

    pub fn list_all(&self) -> Result<Vec<TableMapping>, StoreError> {
        Ok(to_sorted_list(self.load()?))
    }

    /// Entries whose table number is not a positive integer are skipped, so a
    /// hand-edit gone wrong only loses that one table.
    fn load(&self) -> Result<PersistedMapping, StoreError> {
        let raw: BTreeMap<String, Value> = load_json(&self.path)?;
        Ok(raw
            .into_iter()
            .filter_map(|(token, value)| {
                match value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| *n > 0)
                {
                    Some(table_number) => Some((token, table_number)),
                    None => {
                        warn!(token = %token, value = %value, "skipping invalid table mapping entry");
                        None
                    }
                }
            })
            .collect())
    }
}

fn to_sorted_list(mapping: PersistedMapping) -> Vec<TableMapping> {
    let mut tables: Vec<TableMapping> = mapping
        .into_iter()
        .map(|(token, table_number)| TableMapping {
            token,
            table_number,
        })
        .collect();
    tables.sort_by(|a, b| {
        a.table_number
            .cmp(&b.table_number)
            .then_with(|| a.token.cmp(&b.token))
    });
    tables
}
