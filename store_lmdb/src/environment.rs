//! LMDB environment setup.

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::LmdbError;

/// Named databases created in every environment.
pub(crate) const PROPOSALS_DB: &str = "proposals";
pub(crate) const RECEIPTS_DB: &str = "receipts";

/// Default map size: 1 GiB of address space (LMDB grows the file lazily).
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
#[derive(Clone)]
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) proposals: Database<Str, Bytes>,
    pub(crate) receipts: Database<Str, Bytes>,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment directory is owned by this process; LMDB
        // forbids opening the same environment twice in one process, which
        // callers uphold by opening it once at startup.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(4)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let proposals: Database<Str, Bytes> = env.create_database(&mut wtxn, Some(PROPOSALS_DB))?;
        let receipts: Database<Str, Bytes> = env.create_database(&mut wtxn, Some(RECEIPTS_DB))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env,
            proposals,
            receipts,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
