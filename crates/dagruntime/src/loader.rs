// crates/dagruntime/src/loader.rs
use async_trait::async_trait;
use dagcore::{DataSet, ParameterBundle, Result, Value};
use std::path::{Path, PathBuf};

/// Produces the pool of supplied data for a simulation
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load_data(&self) -> Result<DataSet>;
}

/// Produces the user parameter bundle for a simulation
#[async_trait]
pub trait ParameterSource: Send + Sync {
    async fn load_params(&self) -> Result<ParameterBundle>;
}

/// Reads a JSON object from disk.
///
/// Numeric arrays become series; every other JSON value maps onto the
/// corresponding `Value` variant.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Vec<(String, Value)>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let json: serde_json::Value = serde_json::from_str(&contents)?;

        let serde_json::Value::Object(obj) = json else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} must contain a JSON object", self.path.display()),
            )
            .into());
        };

        tracing::debug!("Loaded {} entries from {}", obj.len(), self.path.display());
        obj.into_iter()
            .map(|(k, v)| Ok((k, Value::try_from(v)?)))
            .collect()
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn load_data(&self) -> Result<DataSet> {
        Ok(self.read_entries().await?.into_iter().collect())
    }
}

#[async_trait]
impl ParameterSource for JsonFileSource {
    async fn load_params(&self) -> Result<ParameterBundle> {
        Ok(self.read_entries().await?.into_iter().collect())
    }
}
