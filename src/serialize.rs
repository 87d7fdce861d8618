use crate::error::{Result, ScionicError};
use crate::types::Dag;
use std::fs;
use std::path::Path;

impl Dag {
    /// Serialize DAG to JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ScionicError::Serialization(e.to_string()))
    }

    /// Serialize DAG to pretty JSON
    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| ScionicError::Serialization(e.to_string()))
    }

    /// Deserialize DAG from JSON
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| ScionicError::Deserialization(e.to_string()))
    }

    /// Serialize DAG to CBOR (the canonical container format)
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        serde_cbor::to_vec(self).map_err(|e| ScionicError::Serialization(e.to_string()))
    }

    /// Deserialize DAG from CBOR.
    ///
    /// Deserialization derives nothing; call `verify` to establish trust in
    /// a loaded DAG.
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        serde_cbor::from_slice(data).map_err(|e| ScionicError::Deserialization(e.to_string()))
    }

    /// Save DAG to file (CBOR format)
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = self.to_cbor()?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Load DAG from file (CBOR format)
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_cbor(&data)
    }
}

/// Read a serialized DAG from disk.
pub fn read_dag(path: impl AsRef<Path>) -> Result<Dag> {
    Dag::load_from_file(path)
}
