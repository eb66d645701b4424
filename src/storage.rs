// SPDX-License-Identifier: MPL-2.0

//! Review notes persistence and export
//!
//! Restaurants and their dishes live in one JSON document. Every mutation is
//! written through immediately; operations on unknown ids are logged and
//! ignored.

use crate::config::Config;
use crate::constants::file_formats;
use crate::errors::StorageError;
use crate::utils::lock;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub tastes: Vec<String>,
    /// JPEG thumbnail from the capture studio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
}

impl Dish {
    pub fn new(name: impl Into<String>, tastes: Vec<String>, thumbnail: Option<Vec<u8>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            date: Utc::now(),
            tastes,
            thumbnail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub dishes: Vec<Dish>,
}

/// Restaurant and dish store
pub trait ReviewListRepository: Send + Sync {
    fn save_restaurant(&self, id: &str, name: &str) -> Result<(), StorageError>;

    /// All restaurants, oldest first
    fn fetch_restaurants(&self) -> Result<Vec<Restaurant>, StorageError>;

    fn delete_restaurant(&self, id: &str) -> Result<(), StorageError>;

    fn save_dish(&self, restaurant_id: &str, dish: Dish) -> Result<(), StorageError>;

    fn fetch_dishes(&self, restaurant_id: &str) -> Result<Vec<Dish>, StorageError>;

    fn delete_dish(&self, restaurant_id: &str, dish_id: &str) -> Result<(), StorageError>;

    fn add_taste(&self, restaurant_id: &str, dish_id: &str, taste: &str)
    -> Result<(), StorageError>;

    fn fetch_tastes(&self, restaurant_id: &str, dish_id: &str) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReviewDocument {
    restaurants: Vec<Restaurant>,
}

impl ReviewDocument {
    fn restaurant_mut(&mut self, id: &str) -> Option<&mut Restaurant> {
        self.restaurants.iter_mut().find(|r| r.id == id)
    }
}

/// [`ReviewListRepository`] backed by a JSON file
pub struct JsonReviewStorage {
    path: PathBuf,
    document: Mutex<ReviewDocument>,
}

impl JsonReviewStorage {
    /// Open the document at `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let document = if path.exists() {
            let data = fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            debug!(path = %path.display(), "No review document yet");
            ReviewDocument::default()
        };
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` and write the document; `change` returns false for a no-op
    fn update(&self, change: impl FnOnce(&mut ReviewDocument) -> bool) -> Result<(), StorageError> {
        let mut document = lock(&self.document);
        if !change(&mut document) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves half a document
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(&*document)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn read<T>(&self, view: impl FnOnce(&ReviewDocument) -> T) -> T {
        view(&lock(&self.document))
    }
}

impl ReviewListRepository for JsonReviewStorage {
    fn save_restaurant(&self, id: &str, name: &str) -> Result<(), StorageError> {
        self.update(|document| {
            if let Some(existing) = document.restaurant_mut(id) {
                existing.name = name.to_string();
            } else {
                document.restaurants.push(Restaurant {
                    id: id.to_string(),
                    name: name.to_string(),
                    date: Utc::now(),
                    dishes: Vec::new(),
                });
            }
            info!(restaurant = %name, "Restaurant saved");
            true
        })
    }

    fn fetch_restaurants(&self) -> Result<Vec<Restaurant>, StorageError> {
        let mut restaurants = self.read(|document| document.restaurants.clone());
        restaurants.sort_by_key(|r| r.date);
        Ok(restaurants)
    }

    fn delete_restaurant(&self, id: &str) -> Result<(), StorageError> {
        self.update(|document| {
            let before = document.restaurants.len();
            document.restaurants.retain(|r| r.id != id);
            if document.restaurants.len() == before {
                warn!(restaurant = %id, "Cannot delete unknown restaurant");
                return false;
            }
            true
        })
    }

    fn save_dish(&self, restaurant_id: &str, dish: Dish) -> Result<(), StorageError> {
        self.update(|document| {
            let Some(restaurant) = document.restaurant_mut(restaurant_id) else {
                warn!(restaurant = %restaurant_id, dish = %dish.name, "Cannot save dish of unknown restaurant");
                return false;
            };
            match restaurant.dishes.iter_mut().find(|d| d.id == dish.id) {
                Some(existing) => *existing = dish,
                None => restaurant.dishes.push(dish),
            }
            true
        })
    }

    fn fetch_dishes(&self, restaurant_id: &str) -> Result<Vec<Dish>, StorageError> {
        self.read(|document| {
            match document.restaurants.iter().find(|r| r.id == restaurant_id) {
                Some(restaurant) => Ok(restaurant.dishes.clone()),
                None => Err(StorageError::NotFound(restaurant_id.to_string())),
            }
        })
    }

    fn delete_dish(&self, restaurant_id: &str, dish_id: &str) -> Result<(), StorageError> {
        self.update(|document| {
            let Some(restaurant) = document.restaurant_mut(restaurant_id) else {
                warn!(restaurant = %restaurant_id, "Cannot delete dish of unknown restaurant");
                return false;
            };
            let before = restaurant.dishes.len();
            restaurant.dishes.retain(|d| d.id != dish_id);
            restaurant.dishes.len() != before
        })
    }

    fn add_taste(
        &self,
        restaurant_id: &str,
        dish_id: &str,
        taste: &str,
    ) -> Result<(), StorageError> {
        self.update(|document| {
            let dish = document
                .restaurant_mut(restaurant_id)
                .and_then(|r| r.dishes.iter_mut().find(|d| d.id == dish_id));
            let Some(dish) = dish else {
                warn!(restaurant = %restaurant_id, dish = %dish_id, "Cannot add taste to unknown dish");
                return false;
            };
            dish.tastes.push(taste.to_string());
            true
        })
    }

    fn fetch_tastes(&self, restaurant_id: &str, dish_id: &str) -> Result<Vec<String>, StorageError> {
        self.fetch_dishes(restaurant_id)?
            .into_iter()
            .find(|d| d.id == dish_id)
            .map(|d| d.tastes)
            .ok_or_else(|| StorageError::NotFound(dish_id.to_string()))
    }
}

/// The single "delete immediately vs. confirm" preference
pub trait SettingsRepository: Send + Sync {
    fn fetch_is_delete_immediate(&self) -> bool;

    fn save_is_delete_immediate(&self, value: bool) -> Result<(), StorageError>;
}

/// [`SettingsRepository`] persisted in the config file
pub struct ConfigSettings {
    path: PathBuf,
}

impl ConfigSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsRepository for ConfigSettings {
    fn fetch_is_delete_immediate(&self) -> bool {
        Config::load_or_default(&self.path).is_delete_immediate
    }

    fn save_is_delete_immediate(&self, value: bool) -> Result<(), StorageError> {
        let mut config = Config::load_or_default(&self.path);
        config.is_delete_immediate = value;
        config.save_to(&self.path)
    }
}

/// Format of exported notes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => file_formats::MARKDOWN_EXTENSION,
            ExportFormat::Csv => file_formats::CSV_EXTENSION,
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unsupported export format '{}'", other)),
        }
    }
}

/// `yyyyMMdd` of the restaurant's creation day, its name, the extension
///
/// Path separators and characters file systems refuse are replaced so the
/// file always lands directly in the export directory.
pub fn export_file_name(restaurant: &Restaurant, format: ExportFormat) -> String {
    let name = file_name_component(&restaurant.name);
    format!(
        "{}{}.{}",
        restaurant.date.with_timezone(&Local).format("%Y%m%d"),
        if name.is_empty() { file_name_component(&restaurant.id) } else { name },
        format.extension()
    )
}

fn file_name_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Render a restaurant's notes
pub fn render_export(restaurant: &Restaurant, format: ExportFormat) -> String {
    match format {
        ExportFormat::Markdown => {
            let mut contents = format!("## {}", restaurant.name);
            for dish in &restaurant.dishes {
                contents.push_str(&format!("\n\n{}: {:?}", dish.name, dish.tastes));
            }
            contents
        }
        ExportFormat::Csv => {
            let mut contents = String::from("dish,tastes\n");
            for dish in &restaurant.dishes {
                contents.push_str(&csv_field(&dish.name));
                contents.push(',');
                contents.push_str(&csv_field(&dish.tastes.join(";")));
                contents.push('\n');
            }
            contents
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes exported notes and remembers what it wrote
pub struct Exporter {
    dir: PathBuf,
    created: Vec<PathBuf>,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: Vec::new(),
        }
    }

    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    pub fn create_file(
        &mut self,
        restaurant: &Restaurant,
        format: ExportFormat,
    ) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(export_file_name(restaurant, format));
        fs::write(&path, render_export(restaurant, format))?;
        info!(path = %path.display(), "Notes exported");
        self.created.push(path.clone());
        Ok(path)
    }

    /// Remove the files this exporter created; returns how many were removed
    pub fn remove_files(&mut self) -> usize {
        self.created
            .drain(..)
            .filter(|path| remove_logged(path))
            .count()
    }
}

/// Remove every exported file in `dir`, including ones from earlier runs
pub fn remove_exported_files(dir: &Path) -> Result<usize, StorageError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let exported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(file_formats::is_export_extension);
        if exported && remove_logged(&path) {
            removed += 1;
        }
    }
    Ok(removed)
}

fn remove_logged(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Exported file removed");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove exported file");
            false
        }
    }
}
