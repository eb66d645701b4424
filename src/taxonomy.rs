// SPDX-License-Identifier: GPL-3.0-only

//! Taste taxonomy
//!
//! Sections of taste descriptors a dish can be tagged with. The strings are
//! opaque data: a default set is compiled in, and a JSON file with the same
//! shape can replace it.

use crate::errors::StorageError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN_TASTES: &str = include_str!("../resources/tastes.json");

/// One category of tastes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TastesSection {
    pub category_index: usize,
    pub title: String,
    pub tastes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    sections: Vec<TastesSection>,
}

impl Taxonomy {
    pub fn new(mut sections: Vec<TastesSection>) -> Self {
        sections.sort_by_key(|section| section.category_index);
        Self { sections }
    }

    /// The compiled-in taxonomy
    pub fn builtin() -> Self {
        match serde_json::from_str(BUILTIN_TASTES) {
            Ok(sections) => Self::new(sections),
            Err(e) => {
                warn!(error = %e, "Built-in taxonomy is unreadable");
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, StorageError> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&data)?))
    }

    /// Use the override file when given and readable, the built-in set otherwise
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::from_path(path) {
            Ok(taxonomy) => {
                debug!(path = %path.display(), sections = taxonomy.sections.len(), "Taxonomy loaded");
                taxonomy
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load taxonomy, using built-in set");
                Self::builtin()
            }
        }
    }

    pub fn sections(&self) -> &[TastesSection] {
        &self.sections
    }

    pub fn section(&self, category_index: usize) -> Option<&TastesSection> {
        self.sections
            .iter()
            .find(|section| section.category_index == category_index)
    }

    /// Taste at a position, as picked from a category grid
    pub fn taste(&self, category_index: usize, index: usize) -> Option<&str> {
        self.section(category_index)?
            .tastes
            .get(index)
            .map(String::as_str)
    }

    /// Every taste once, in section order
    pub fn all_tastes(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.sections
            .iter()
            .flat_map(|section| section.tastes.iter())
            .filter(|taste| seen.insert(taste.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn contains(&self, taste: &str) -> bool {
        self.sections
            .iter()
            .any(|section| section.tastes.iter().any(|t| t == taste))
    }
}
