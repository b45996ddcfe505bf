use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StorageError;
use crate::state::VibinHostDetails;

const STORE_FILE_NAME: &str = "host.redb";
const HOST_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("vibin_host_details");

/// The record key. Fixed; the store holds exactly one record.
const HOST_DETAILS_KEY: &str = "vibin-host-details";

/// Durable store for the [`VibinHostDetails`] record.
///
/// The record is JSON under a fixed key in a redb database. Every write is a
/// committed transaction, so a crash immediately after a successful call
/// never loses that write. Writes are last-writer-wins; the engine is the
/// only writer and runs single-threaded.
pub struct HostStore {
    db: Database,
    default_host: String,
}

impl HostStore {
    /// Open (or create) the store in the platform data directory.
    pub fn open_default(default_host: &str) -> Result<Self, StorageError> {
        let data_dir = dirs::data_dir()
            .ok_or(StorageError::NoDataDir)?
            .join("vibin-remote");
        std::fs::create_dir_all(&data_dir)?;
        Self::open(data_dir.join(STORE_FILE_NAME), default_host)
    }

    /// Open (or create) the store at an explicit path.
    pub fn open(path: impl AsRef<Path>, default_host: &str) -> Result<Self, StorageError> {
        let db = Database::create(path)?;
        // Ensure table exists
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(HOST_TABLE)?;
        }
        txn.commit()?;
        Ok(Self {
            db,
            default_host: default_host.to_string(),
        })
    }

    /// Read the host record, initializing it with the default host on first
    /// access. After a successful call a read can never come back empty.
    pub fn get_or_init(&self) -> Result<VibinHostDetails, StorageError> {
        if let Some(existing) = self.read()? {
            return Ok(existing);
        }

        let default = VibinHostDetails {
            host: self.default_host.clone(),
            have_connected: false,
        };
        self.write(&default)?;

        // Return what was durably written, not the in-memory candidate.
        self.read()?.ok_or(StorageError::LostRecord)
    }

    /// Replace the stored host, keeping connection history. The record must
    /// already exist; before `get_or_init` this is a silent no-op returning
    /// `None`, never the creation of a partial record.
    pub fn set_host(&self, host: &str) -> Result<Option<VibinHostDetails>, StorageError> {
        self.modify(|record| record.host = host.to_string())
    }

    /// Record whether the most recent connection attempt to the stored host
    /// succeeded. Same read-modify-write discipline as [`set_host`](Self::set_host).
    pub fn set_have_connected(
        &self,
        value: bool,
    ) -> Result<Option<VibinHostDetails>, StorageError> {
        self.modify(|record| record.have_connected = value)
    }

    /// Read-modify-write in a single transaction, returning the post-write
    /// record, or `None` without touching the store if no record exists.
    fn modify(
        &self,
        apply: impl FnOnce(&mut VibinHostDetails),
    ) -> Result<Option<VibinHostDetails>, StorageError> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(HOST_TABLE)?;
            let current = table
                .get(HOST_DETAILS_KEY)?
                .map(|raw| serde_json::from_slice::<VibinHostDetails>(raw.value()))
                .transpose()?;

            match current {
                Some(mut record) => {
                    apply(&mut record);
                    let json = serde_json::to_vec(&record)?;
                    table.insert(HOST_DETAILS_KEY, json.as_slice())?;
                    Some(record)
                }
                None => None,
            }
        };

        if updated.is_some() {
            txn.commit()?;
        } else {
            txn.abort()?;
        }

        Ok(updated)
    }

    fn read(&self) -> Result<Option<VibinHostDetails>, StorageError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(HOST_TABLE)?;
        let record = table
            .get(HOST_DETAILS_KEY)?
            .map(|raw| serde_json::from_slice(raw.value()))
            .transpose()?;
        Ok(record)
    }

    fn write(&self, record: &VibinHostDetails) -> Result<(), StorageError> {
        let json = serde_json::to_vec(record)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(HOST_TABLE)?;
            table.insert(HOST_DETAILS_KEY, json.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }
}
