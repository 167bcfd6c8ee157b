//! ESP-IDF NVS-backed [`meshx::storage::PersistBackend`].
//!
//! Grounded on `original_source/.../port/esp_idf/utils/esp_nvs.c`
//! (`meshx_nvs_plat_open/_read/_write/_erase/_remove/_commit`) and the
//! teacher's own `firmware/src/storage.rs` (`Storage<T: NvsPartitionId>`
//! wrapping `EspNvs`): same namespace-scoped blob storage, generalized
//! from the teacher's string-only `get_str`/`set_str` to the byte blobs
//! [`meshx::storage::PersistBackend`] requires.

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsPartitionId};
use meshx::error::{MeshxError, Result};
use meshx::storage::PersistBackend;

const NAMESPACE: &str = "meshx";
/// Matches the original's `MESHX_NVS_ELEMENT_CTX` blob size ceiling;
/// generous enough for any per-model status struct this crate encodes.
const MAX_BLOB_LEN: usize = 256;

pub struct EspNvsBackend<T: NvsPartitionId> {
    nvs: std::sync::Mutex<EspNvs<T>>,
}

impl<T: NvsPartitionId> EspNvsBackend<T> {
    pub fn new(partition: EspNvsPartition<T>) -> Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true).map_err(|err| MeshxError::Platform(err.to_string()))?;
        Ok(Self { nvs: std::sync::Mutex::new(nvs) })
    }
}

impl<T: NvsPartitionId + Send + Sync> PersistBackend for EspNvsBackend<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let nvs = self.nvs.lock().expect("nvs backend lock poisoned");
        let mut buf = [0u8; MAX_BLOB_LEN];
        match nvs.get_blob(key, &mut buf) {
            Ok(Some(slice)) => Ok(Some(slice.to_vec())),
            Ok(None) => Ok(None),
            Err(err) => Err(MeshxError::Platform(err.to_string())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if value.len() > MAX_BLOB_LEN {
            return Err(MeshxError::InvalidArg);
        }
        let mut nvs = self.nvs.lock().expect("nvs backend lock poisoned");
        nvs.set_blob(key, value).map_err(|err| MeshxError::Platform(err.to_string()))
    }

    fn erase(&self, key: &str) -> Result<()> {
        let mut nvs = self.nvs.lock().expect("nvs backend lock poisoned");
        nvs.remove(key).map(|_| ()).map_err(|err| MeshxError::Platform(err.to_string()))
    }

    fn commit(&self) -> Result<()> {
        // `EspNvs::set_blob`/`remove` commit to flash internally (unlike
        // the original's explicit `nvs_commit` call); nothing further to
        // flush here.
        Ok(())
    }
}
