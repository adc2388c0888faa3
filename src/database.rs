pub mod equipment;
pub mod pop;
mod query;

use std::{fs, marker::PhantomData, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};
use tracing::info;

use crate::model::{Entity, Record};
use equipment::Equipment;
use pop::Pop;

const EQUIPMENT_TREE: &str = "equipment";
const POP_TREE: &str = "pop";

/// A stored record type, keyed by its numeric identifier.
pub(crate) trait Row: Serialize + DeserializeOwned {
    fn id(&self) -> i64;
}

#[derive(Clone)]
pub struct Database {
    db: Db,
    equipment_partition: Tree,
    pop_partition: Tree,
}

impl Database {
    pub fn connect(path: &Path) -> Result<Database> {
        let db = sled::open(path)
            .with_context(|| format!("cannot open database at {}", path.display()))?;
        let equipment_partition = db.open_tree(EQUIPMENT_TREE)?;
        let pop_partition = db.open_tree(POP_TREE)?;
        Ok(Database {
            db,
            equipment_partition,
            pop_partition,
        })
    }

    fn partition(&self, entity: Entity) -> &Tree {
        match entity {
            Entity::Equipment => &self.equipment_partition,
            Entity::Pop => &self.pop_partition,
        }
    }

    fn insert<T: Row>(item: &T, tree: &Tree) -> Result<()> {
        tree.insert(item.id().to_be_bytes(), bincode::serialize(item)?)?;
        Ok(())
    }

    pub fn insert_equipment(&self, rows: Vec<Equipment>) -> Result<()> {
        for item in &rows {
            Database::insert(item, &self.equipment_partition)?;
        }
        self.db.flush()?;
        Ok(())
    }

    pub fn insert_pops(&self, rows: Vec<Pop>) -> Result<()> {
        for item in &rows {
            Database::insert(item, &self.pop_partition)?;
        }
        self.db.flush()?;
        Ok(())
    }

    /// Loads a JSON array of records of `entity` from `path` and stores them,
    /// replacing rows with the same identifier.
    pub fn import_json(&self, entity: Entity, path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let count = match entity {
            Entity::Equipment => {
                let rows: Vec<Equipment> = serde_json::from_str(&text)
                    .with_context(|| format!("invalid equipment data in {}", path.display()))?;
                let count = rows.len();
                self.insert_equipment(rows)?;
                count
            }
            Entity::Pop => {
                let rows: Vec<Pop> = serde_json::from_str(&text)
                    .with_context(|| format!("invalid PoP data in {}", path.display()))?;
                let count = rows.len();
                self.insert_pops(rows)?;
                count
            }
        };
        info!("Imported {count} {entity} records from {}", path.display());
        Ok(count)
    }

    pub(crate) fn equipment(&self) -> Iter<Equipment> {
        Iter::new(self.equipment_partition.iter())
    }

    pub(crate) fn pops(&self) -> Iter<Pop> {
        Iter::new(self.pop_partition.iter())
    }

    /// Every stored row of `entity` as a record, in identifier order.
    pub(crate) fn records(&self, entity: Entity) -> Box<dyn Iterator<Item = Result<Record>> + '_> {
        match entity {
            Entity::Equipment => Box::new(self.equipment().map(|r| r.and_then(to_record))),
            Entity::Pop => Box::new(self.pops().map(|r| r.and_then(to_record))),
        }
    }

    pub(crate) fn record(&self, entity: Entity, id: i64) -> Result<Option<Record>> {
        let Some(val) = self.partition(entity).get(id.to_be_bytes())? else {
            return Ok(None);
        };
        let record = match entity {
            Entity::Equipment => to_record(bincode::deserialize::<Equipment>(&val)?)?,
            Entity::Pop => to_record(bincode::deserialize::<Pop>(&val)?)?,
        };
        Ok(Some(record))
    }
}

fn to_record<T: Serialize>(row: T) -> Result<Record> {
    match serde_json::to_value(row)? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("row serialized to a non-object: {other}"),
    }
}

pub(crate) struct Iter<T> {
    inner: sled::Iter,
    phantom: PhantomData<T>,
}

impl<T> Iter<T> {
    fn new(inner: sled::Iter) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for Iter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| {
            let (_, val) = item?;
            Ok(bincode::deserialize::<T>(&val)?)
        })
    }
}

#[cfg(test)]
pub(crate) struct TestDatabase {
    _dir: tempfile::TempDir,
    pub(crate) db: Database,
}

#[cfg(test)]
impl TestDatabase {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        Self { _dir: dir, db }
    }

    /// A small inventory spread over two states.
    pub(crate) fn seeded() -> Self {
        let test = Self::new();
        test.db
            .insert_pops(vec![
                pop::tests::pop(1_010_010, "Agartala", "Tripura", 23.83, 91.28),
                pop::tests::pop(1_010_020, "Udaipur", "Tripura", 23.53, 91.48),
                pop::tests::pop(2_020_010, "Lucknow", "Uttar Pradesh", 26.84, 80.94),
                pop::tests::pop(3_030_010, "Connaught Place", "Delhi", 28.63, 77.21),
            ])
            .unwrap();
        test.db
            .insert_equipment(vec![
                equipment::tests::equipment(1, "Lucknow", "D-Link", "L2 Switch"),
                equipment::tests::equipment(2, "Lucknow", "D-Link", "Aggregation Switch"),
                equipment::tests::equipment(3, "Lucknow", "Juniper", "Core Router"),
                equipment::tests::equipment(4, "Connaught Place", "Juniper", "Core Router"),
                equipment::tests::equipment(5, "Connaught Place", "Fiberhome", "BNG"),
                equipment::tests::equipment(6, "Udaipur", "D-Link", "L2 Switch"),
            ])
            .unwrap();
        test
    }
}
