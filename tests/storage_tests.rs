// SPDX-License-Identifier: MPL-2.0

//! Integration tests for review storage, settings and exports

use shari::errors::StorageError;
use shari::storage::{
    ConfigSettings, Dish, ExportFormat, Exporter, JsonReviewStorage, ReviewListRepository,
    SettingsRepository, remove_exported_files,
};
use tempfile::TempDir;

fn temp_root() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn test_reviews_survive_reopen() {
    let root = temp_root();
    let path = root.path().join("reviews.json");

    let dish = Dish::new("Tonkotsu", vec!["rich".to_string()], Some(vec![0xFF, 0xD8]));
    let dish_id = dish.id.clone();
    {
        let storage = JsonReviewStorage::open(&path).unwrap();
        storage.save_restaurant("r1", "Ichiran").unwrap();
        storage.save_dish("r1", dish).unwrap();
        storage.add_taste("r1", &dish_id, "salty").unwrap();
    }

    let storage = JsonReviewStorage::open(&path).unwrap();
    let restaurants = storage.fetch_restaurants().unwrap();
    assert_eq!(restaurants.len(), 1);
    assert_eq!(restaurants[0].name, "Ichiran");
    assert_eq!(
        storage.fetch_tastes("r1", &dish_id).unwrap(),
        vec!["rich".to_string(), "salty".to_string()]
    );
    let dishes = storage.fetch_dishes("r1").unwrap();
    assert_eq!(dishes[0].thumbnail.as_deref(), Some(&[0xFF, 0xD8][..]));
    assert!(!root.path().join("reviews.json.tmp").exists());
}

#[test]
fn test_restaurants_sorted_by_date_and_renamed_in_place() {
    let root = temp_root();
    let storage = JsonReviewStorage::open(root.path().join("reviews.json")).unwrap();

    storage.save_restaurant("a", "First").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    storage.save_restaurant("b", "Second").unwrap();
    storage.save_restaurant("a", "First, renamed").unwrap();

    let names: Vec<String> = storage
        .fetch_restaurants()
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["First, renamed".to_string(), "Second".to_string()]);
}

#[test]
fn test_deletes_and_unknown_ids() {
    let root = temp_root();
    let storage = JsonReviewStorage::open(root.path().join("reviews.json")).unwrap();
    storage.save_restaurant("r1", "Noodle Bar").unwrap();
    let dish = Dish::new("Dan dan", Vec::new(), None);
    let dish_id = dish.id.clone();
    storage.save_dish("r1", dish).unwrap();

    // Unknown ids are no-ops, not errors
    storage.delete_dish("missing", &dish_id).unwrap();
    storage.delete_restaurant("missing").unwrap();
    storage
        .save_dish("missing", Dish::new("Ghost", Vec::new(), None))
        .unwrap();
    assert!(matches!(
        storage.fetch_dishes("missing"),
        Err(StorageError::NotFound(_))
    ));

    storage.delete_dish("r1", &dish_id).unwrap();
    assert!(storage.fetch_dishes("r1").unwrap().is_empty());
    storage.delete_restaurant("r1").unwrap();
    assert!(storage.fetch_restaurants().unwrap().is_empty());
}

#[test]
fn test_settings_round_trip_through_config_file() {
    let root = temp_root();
    let settings = ConfigSettings::new(root.path().join("config.json"));

    assert!(!settings.fetch_is_delete_immediate());
    settings.save_is_delete_immediate(true).unwrap();
    assert!(settings.fetch_is_delete_immediate());
    assert!(ConfigSettings::new(root.path().join("config.json")).fetch_is_delete_immediate());
}

#[test]
fn test_export_and_clean() {
    let root = temp_root();
    let storage = JsonReviewStorage::open(root.path().join("reviews.json")).unwrap();
    storage.save_restaurant("r1", "Ramen Ya").unwrap();
    storage
        .save_dish(
            "r1",
            Dish::new("Shoyu", vec!["umami".to_string(), "light".to_string()], None),
        )
        .unwrap();
    let restaurant = storage.fetch_restaurants().unwrap().remove(0);

    let exports = root.path().join("exports");
    let mut exporter = Exporter::new(&exports);
    let markdown = exporter.create_file(&restaurant, ExportFormat::Markdown).unwrap();
    let csv = exporter.create_file(&restaurant, ExportFormat::Csv).unwrap();

    let contents = std::fs::read_to_string(&markdown).unwrap();
    assert!(contents.starts_with("## Ramen Ya"));
    assert!(contents.contains("Shoyu: [\"umami\", \"light\"]"));
    assert_eq!(
        std::fs::read_to_string(&csv).unwrap(),
        "dish,tastes\nShoyu,umami;light\n"
    );
    assert_eq!(exporter.created().len(), 2);

    assert_eq!(exporter.remove_files(), 2);
    assert!(!markdown.exists());

    exporter.create_file(&restaurant, ExportFormat::Csv).unwrap();
    std::fs::write(exports.join("keep.json"), "{}").unwrap();
    assert_eq!(remove_exported_files(&exports).unwrap(), 1);
    assert!(exports.join("keep.json").exists());
    assert_eq!(remove_exported_files(&root.path().join("nowhere")).unwrap(), 0);
}
