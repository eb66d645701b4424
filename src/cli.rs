// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing the virtual camera's formats
//! - Taking photos and recording videos through the capture studio
//! - Managing restaurants, dishes and their tasting notes
//! - Exporting notes

use shari::Config;
use shari::backends::camera::{
    CameraBackend, CameraBackendType, MovieFrameRate, MovieResolution, ZoomFactor, get_backend,
};
use shari::constants::{get_resolution_tier, timing};
use shari::library::DirectoryLibrary;
use shari::pipelines::photo::SavedPhoto;
use shari::storage::{
    ConfigSettings, Dish, ExportFormat, Exporter, JsonReviewStorage, Restaurant,
    ReviewListRepository, SettingsRepository, remove_exported_files,
};
use shari::studio::{CaptureMode, RecordingToggle, Studio, StudioEvent, StudioServices};
use shari::taxonomy::Taxonomy;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// List the formats of the camera
pub fn list_cameras() -> CliResult {
    let backend = get_backend(CameraBackendType::Virtual);
    let Some(device) = backend.find_camera() else {
        println!("No cameras found.");
        return Ok(());
    };

    println!("Available cameras:");
    println!();
    println!("  [0] {} ({})", device.name(), backend.backend_type());
    let active = device.active_format();
    for format in device.formats() {
        let marker = if format == active { "*" } else { " " };
        println!(
            "    {} {:<5} {}",
            marker,
            get_resolution_tier(format.dimensions).display_name(),
            format
        );
    }
    if let Some(microphone) = backend.find_microphone() {
        println!();
        println!("  Microphone: {}", microphone.name);
    }
    Ok(())
}

fn build_studio(config: &Config) -> Studio {
    let backend = get_backend(CameraBackendType::Virtual);
    let library = Arc::new(DirectoryLibrary::new(config.photos_dir(), config.videos_dir()));
    let services = StudioServices::new(backend, library)
        .with_temp_dir(config.temp_dir())
        .with_photo_preferences(config.photo)
        .with_movie_resolution(config.movie_resolution);
    Studio::new(services)
}

/// Next event, or `None` once `deadline` passed
fn next_event(
    events: &mut broadcast::Receiver<StudioEvent>,
    deadline: Instant,
) -> Option<StudioEvent> {
    while Instant::now() < deadline {
        match events.try_recv() {
            Ok(event) => return Some(event),
            Err(TryRecvError::Empty) => std::thread::sleep(timing::EVENT_POLL_INTERVAL),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Missed studio events");
            }
            Err(TryRecvError::Closed) => return None,
        }
    }
    None
}

/// Capture `count` photos and wait for them to reach the library
fn capture_photos(config: &Config, count: u32, zoom: Option<ZoomFactor>) -> CliResult<Vec<SavedPhoto>> {
    let studio = build_studio(config);
    let mut events = studio.events();

    studio
        .integrate_session(CaptureMode::Photo, config.movie_resolution.preset(), None)
        .wait()?;
    studio.start_session_running().wait()?;

    let zoom = zoom.unwrap_or(config.zoom);
    if zoom != ZoomFactor::One {
        let applied = studio.change_zoom(zoom).wait()?;
        println!("Zoom: {}x", applied);
    }

    for _ in 0..count {
        let request = studio.capture_photo().wait()?;
        println!("Requested photo {}", request);
    }

    let mut saved = Vec::new();
    let mut finished = 0;
    let deadline = Instant::now() + timing::COMPLETION_TIMEOUT;
    while finished < count {
        match next_event(&mut events, deadline) {
            Some(StudioEvent::PhotoSaved(photo)) => {
                println!("Photo saved: {}", photo.location.display());
                saved.push(photo);
                finished += 1;
            }
            Some(StudioEvent::PhotoDiscarded { request, reason }) => {
                eprintln!("Photo {} discarded: {}", request, reason);
                finished += 1;
            }
            Some(_) => {}
            None => {
                eprintln!("Timed out waiting for {} photo(s)", count - finished);
                break;
            }
        }
    }

    studio.stop_session_running().wait()?;
    Ok(saved)
}

/// Take photos through the capture studio
pub fn take_photo(count: u32, zoom: Option<ZoomFactor>) -> CliResult {
    let config = Config::load();
    let saved = capture_photos(&config, count.max(1), zoom)?;
    if saved.is_empty() {
        return Err("No photo was saved".into());
    }
    Ok(())
}

/// Record a video through the capture studio
pub fn record_video(
    duration: u64,
    resolution: Option<MovieResolution>,
    fps: Option<u32>,
) -> CliResult {
    let config = Config::load();
    let resolution = resolution.unwrap_or(config.movie_resolution);
    let frame_rate = match fps {
        Some(fps) => MovieFrameRate::from_fps(fps)
            .ok_or_else(|| format!("Unsupported frame rate {}fps, use 30 or 60", fps))?,
        None => config.movie_frame_rate,
    };

    let studio = build_studio(&config);
    let mut events = studio.events();

    studio
        .integrate_session(CaptureMode::Movie, resolution.preset(), None)
        .wait()?;
    let format = studio.change_video_quality(frame_rate, resolution).wait()?;
    println!("Recording format: {}", format);
    studio.start_session_running().wait()?;

    let RecordingToggle::Started(path) = studio.capture_movie().wait()? else {
        return Err("Recording did not start".into());
    };
    println!("Temporary file: {}", path.display());
    println!("Duration: {} seconds", duration);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Recording... (press Ctrl+C to stop early)");
    let elapsed = studio.elapsed_time();
    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);
    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        print!("\rRecording: {}", *elapsed.borrow());
        std::io::Write::flush(&mut std::io::stdout())?;
        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    studio.capture_movie().wait()?;

    let deadline = Instant::now() + timing::COMPLETION_TIMEOUT;
    let result: CliResult = loop {
        match next_event(&mut events, deadline) {
            Some(StudioEvent::RecordingSaved(movie)) => {
                println!("Video saved: {}", movie.location.display());
                if let Some(warning) = movie.warning {
                    println!("Warning: {}", warning);
                }
                break Ok(());
            }
            Some(StudioEvent::RecordingLost { reason }) => break Err(reason.into()),
            Some(_) => {}
            None => break Err("Timed out waiting for the recording to finish".into()),
        }
    };

    studio.stop_session_running().wait()?;
    result
}

fn open_storage(config: &Config) -> CliResult<JsonReviewStorage> {
    Ok(JsonReviewStorage::open(config.reviews_path())?)
}

/// Find a restaurant by id, or by name when the id is unknown
fn find_restaurant(storage: &JsonReviewStorage, key: &str) -> CliResult<Restaurant> {
    let restaurants = storage.fetch_restaurants()?;
    restaurants
        .iter()
        .find(|r| r.id == key)
        .or_else(|| restaurants.iter().find(|r| r.name == key))
        .cloned()
        .ok_or_else(|| format!("No restaurant '{}'", key).into())
}

pub fn add_restaurant(name: &str) -> CliResult {
    let config = Config::load();
    let storage = open_storage(&config)?;
    let id = uuid::Uuid::new_v4().to_string();
    storage.save_restaurant(&id, name)?;
    println!("Added {} ({})", name, id);
    Ok(())
}

pub fn list_restaurants() -> CliResult {
    let config = Config::load();
    let storage = open_storage(&config)?;
    let restaurants = storage.fetch_restaurants()?;
    if restaurants.is_empty() {
        println!("No restaurants yet.");
        return Ok(());
    }
    for restaurant in restaurants {
        println!(
            "{}  {}  {}",
            restaurant.date.format("%Y.%m.%d"),
            restaurant.name,
            restaurant.id
        );
        for dish in &restaurant.dishes {
            let thumbnail = if dish.thumbnail.is_some() { " [photo]" } else { "" };
            println!("    {}: {}{}", dish.name, dish.tastes.join(", "), thumbnail);
        }
    }
    Ok(())
}

/// Delete a restaurant; asks for `--yes` unless deletion is immediate
pub fn delete_restaurant(key: &str, confirmed: bool) -> CliResult {
    let config = Config::load();
    let settings = settings_repository()?;
    if !confirmed && !settings.fetch_is_delete_immediate() {
        return Err("Deletion needs confirmation: pass --yes or enable settings --delete-immediate true".into());
    }
    let storage = open_storage(&config)?;
    let restaurant = find_restaurant(&storage, key)?;
    storage.delete_restaurant(&restaurant.id)?;
    println!("Deleted {}", restaurant.name);
    Ok(())
}

/// Add a dish, optionally photographing it first
pub fn add_dish(restaurant: &str, name: &str, tastes: Vec<String>, photo: bool) -> CliResult {
    let config = Config::load();
    let storage = open_storage(&config)?;
    let restaurant = find_restaurant(&storage, restaurant)?;

    let taxonomy = Taxonomy::load(config.taxonomy_path.as_deref());
    for taste in &tastes {
        if !taxonomy.contains(taste) {
            println!("Note: '{}' is not in the taste taxonomy", taste);
        }
    }

    let thumbnail = if photo {
        capture_photos(&config, 1, None)?
            .into_iter()
            .next()
            .and_then(|saved| saved.thumbnail)
    } else {
        None
    };

    let dish = Dish::new(name, tastes, thumbnail);
    let id = dish.id.clone();
    storage.save_dish(&restaurant.id, dish)?;
    println!("Added {} to {} ({})", name, restaurant.name, id);
    Ok(())
}

/// Export one restaurant, or all of them
pub fn export(restaurant: Option<&str>, format: ExportFormat, clean: bool) -> CliResult {
    let config = Config::load();
    let dir = config.export_dir();
    if clean {
        let removed = remove_exported_files(&dir)?;
        println!("Removed {} exported file(s)", removed);
        return Ok(());
    }

    let storage = open_storage(&config)?;
    let restaurants = match restaurant {
        Some(key) => vec![find_restaurant(&storage, key)?],
        None => storage.fetch_restaurants()?,
    };

    let mut exporter = Exporter::new(dir);
    for restaurant in &restaurants {
        let path = exporter.create_file(restaurant, format)?;
        println!("Exported {}", path.display());
    }
    Ok(())
}

pub fn list_tastes() -> CliResult {
    let config = Config::load();
    let taxonomy = Taxonomy::load(config.taxonomy_path.as_deref());
    for section in taxonomy.sections() {
        println!("[{}] {}", section.category_index, section.title);
        println!("    {}", section.tastes.join(", "));
    }
    Ok(())
}

fn settings_repository() -> CliResult<ConfigSettings> {
    let path = Config::path().ok_or("No config directory")?;
    Ok(ConfigSettings::new(path))
}

/// Show or change the delete-immediately setting
pub fn settings(delete_immediate: Option<bool>) -> CliResult {
    let settings = settings_repository()?;
    if let Some(value) = delete_immediate {
        settings.save_is_delete_immediate(value)?;
    }
    println!("delete immediately: {}", settings.fetch_is_delete_immediate());
    Ok(())
}
