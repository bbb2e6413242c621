// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Model selectors reported by the validation module.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BridgeError, BridgeResult};

/// Models the module is known to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportedModel {
    GeminiFlash,
    GeminiFlashLite,
    GeminiFlashLatest,
    Gemma,
}

impl SupportedModel {
    pub const ALL: [SupportedModel; 4] = [
        SupportedModel::GeminiFlash,
        SupportedModel::GeminiFlashLite,
        SupportedModel::GeminiFlashLatest,
        SupportedModel::Gemma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SupportedModel::GeminiFlash => "GeminiFlash",
            SupportedModel::GeminiFlashLite => "GeminiFlashLite",
            SupportedModel::GeminiFlashLatest => "GeminiFlashLatest",
            SupportedModel::Gemma => "Gemma",
        }
    }

    pub fn parse(name: &str) -> Option<SupportedModel> {
        SupportedModel::ALL.into_iter().find(|model| model.name() == name)
    }
}

impl fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Model name to integer selector, as returned by `getSupportedModels`.
///
/// Names the host does not recognise are kept; the module is the authority
/// on which models exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupportedModels {
    selectors: BTreeMap<String, i32>,
}

impl SupportedModels {
    /// Build the map from the module's JSON object.
    pub fn from_json(value: &Value) -> BridgeResult<Self> {
        let Value::Object(map) = value else {
            return Err(BridgeError::ValidationError(format!(
                "getSupportedModels returned {}, expected an object",
                value
            )));
        };

        let mut selectors = BTreeMap::new();
        for (name, selector) in map {
            let selector = selector
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| {
                    BridgeError::ValidationError(format!(
                        "selector for model '{}' is not an integer: {}",
                        name, selector
                    ))
                })?;
            selectors.insert(name.clone(), selector);
        }
        Ok(Self { selectors })
    }

    pub fn selector(&self, model: SupportedModel) -> Option<i32> {
        self.selector_for(model.name())
    }

    pub fn selector_for(&self, name: &str) -> Option<i32> {
        self.selectors.get(name).copied()
    }

    /// Resolve a CLI-style argument: a model name or a raw selector.
    pub fn resolve(&self, arg: &str) -> Option<i32> {
        self.selector_for(arg).or_else(|| {
            arg.parse::<i32>()
                .ok()
                .filter(|n| self.selectors.values().any(|s| s == n))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.selectors.iter().map(|(name, selector)| (name.as_str(), *selector))
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}
