//! tk-config: plant file format, validation and conversion into engine
//! records.

pub mod schema;
pub mod validate;

use std::path::Path;

use tk_engine::{BlockRecord, EngineError, Loader, Program, Registry, SchedulerConfig};
use tracing::info;

pub use schema::*;
pub use validate::{validate_plant, ValidationError};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Load error: {0}")]
    Engine(#[from] EngineError),
}

pub fn from_yaml_str(content: &str) -> ConfigResult<Plant> {
    let plant: Plant = serde_yaml::from_str(content)?;
    validate_plant(&plant)?;
    Ok(plant)
}

pub fn load_yaml(path: &Path) -> ConfigResult<Plant> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn save_yaml(path: &Path, plant: &Plant) -> ConfigResult<()> {
    validate_plant(plant)?;
    let content = serde_yaml::to_string(plant)?;
    std::fs::write(path, content)?;
    Ok(())
}

impl Plant {
    /// Engine records in declaration order, directive values as text.
    pub fn to_records(&self) -> Vec<BlockRecord> {
        self.blocks
            .iter()
            .map(|block| {
                block
                    .config
                    .iter()
                    .flatten()
                    .fold(BlockRecord::new(&block.name, &block.kind), |record, (k, v)| {
                        record.with(k.as_str(), v)
                    })
            })
            .collect()
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            multiple: self.multiple,
            ..SchedulerConfig::from_millis(self.tick_ms)
        }
    }

    /// Validate, then drive the builder protocol for every block.
    pub fn build(&self, registry: &Registry) -> ConfigResult<Program> {
        validate_plant(self)?;
        let program = Loader::load(registry, &self.to_records())?;
        info!(plant = %self.name, blocks = program.blocks().len(), "plant built");
        Ok(program)
    }
}
