use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use super::error::Result;
use super::job::JobRecord;

/// Fjall-backed persistence for job records, keyed `job:{id}`.
#[derive(Clone)]
pub struct JobLedger {
    keyspace: Keyspace,
    jobs: PartitionHandle,
}

fn encode_job_key(id: &str) -> Vec<u8> {
    format!("job:{}", id).into_bytes()
}

impl JobLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening job ledger");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, jobs })
    }

    pub fn upsert(&self, record: &JobRecord) -> Result<()> {
        let key = encode_job_key(&record.id);
        self.jobs.insert(key, serde_json::to_vec(record)?)?;
        debug!(id = %record.id, state = ?record.state, "Job record upserted");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        match self.jobs.get(encode_job_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
