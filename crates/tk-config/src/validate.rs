//! Plant validation: checks that need no block registry.

use std::collections::HashSet;

use crate::schema::{Plant, Scalar};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Empty name: {context}")]
    EmptyName { context: String },

    #[error("Duplicate block name: {name}")]
    DuplicateBlock { name: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Block {block}: config entry {index} has {keys} keys, expected exactly one")]
    Directive {
        block: String,
        index: usize,
        keys: usize,
    },
}

pub fn validate_plant(plant: &Plant) -> Result<(), ValidationError> {
    if plant.name.trim().is_empty() {
        return Err(ValidationError::EmptyName {
            context: "plant".to_string(),
        });
    }
    if plant.tick_ms == 0 {
        return Err(ValidationError::InvalidValue {
            field: "tick_ms".to_string(),
            value: plant.tick_ms.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if plant.multiple == 0 {
        return Err(ValidationError::InvalidValue {
            field: "multiple".to_string(),
            value: plant.multiple.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let mut names = HashSet::new();
    for block in &plant.blocks {
        if block.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                context: format!("block of type '{}'", block.kind),
            });
        }
        if block.kind.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                context: format!("type of block '{}'", block.name),
            });
        }
        if !names.insert(block.name.as_str()) {
            return Err(ValidationError::DuplicateBlock {
                name: block.name.clone(),
            });
        }
        for (index, entry) in block.config.iter().enumerate() {
            if entry.len() != 1 {
                return Err(ValidationError::Directive {
                    block: block.name.clone(),
                    index,
                    keys: entry.len(),
                });
            }
            for (key, value) in entry {
                if let Scalar::Float(v) = value {
                    return Err(ValidationError::InvalidValue {
                        field: format!("{}.{key}", block.name),
                        value: format!("{v:?}"),
                        reason: "values are integers; fractional numbers are not accepted"
                            .to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
