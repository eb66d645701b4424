// SPDX-License-Identifier: GPL-3.0-only

//! Rotation coordination
//!
//! Two angles are derived from the sensor mount and the current orientation:
//!
//! - the preview angle follows the interface orientation and is pushed to the
//!   preview surface whenever it changes;
//! - the capture angle follows the physical device orientation and is read
//!   fresh at the instant a photo or movie starts.
//!
//! Orientation changes reach coordinators through explicit subscriptions on
//! an [`OrientationSource`]. Dropping the coordinator drops its subscription.

use crate::backends::camera::SensorRotation;
use crate::utils::lock;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Orientation of the user interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    /// Home side on the left
    LandscapeLeft,
    /// Home side on the right
    LandscapeRight,
}

impl InterfaceOrientation {
    fn offset_degrees(&self) -> u32 {
        match self {
            InterfaceOrientation::Portrait => 0,
            InterfaceOrientation::LandscapeRight => 90,
            InterfaceOrientation::PortraitUpsideDown => 180,
            InterfaceOrientation::LandscapeLeft => 270,
        }
    }
}

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    /// Rotated counter-clockwise, the mirror of the interface orientation
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

impl DeviceOrientation {
    /// Flat or unknown orientations say nothing about the horizon
    pub fn is_valid_for_capture(&self) -> bool {
        !matches!(
            self,
            DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown
        )
    }

    fn offset_degrees(&self) -> u32 {
        match self {
            DeviceOrientation::LandscapeLeft => 90,
            DeviceOrientation::PortraitUpsideDown => 180,
            DeviceOrientation::LandscapeRight => 270,
            _ => 0,
        }
    }
}

/// Current interface and device orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orientation {
    pub interface: InterfaceOrientation,
    /// Last orientation valid for capture
    pub device: DeviceOrientation,
}

type Listener = Arc<dyn Fn(Orientation) + Send + Sync>;

/// Publisher of orientation changes
///
/// Listeners see changes in the order they were applied. They must not
/// update the source they listen to.
#[derive(Default)]
pub struct OrientationSource {
    current: Mutex<Orientation>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: Mutex<u64>,
    /// Held from applying a change until every listener saw it
    delivery: Mutex<()>,
}

impl OrientationSource {
    pub fn new(initial: Orientation) -> Self {
        Self {
            current: Mutex::new(initial),
            ..Self::default()
        }
    }

    pub fn current(&self) -> Orientation {
        *lock(&self.current)
    }

    pub fn set_interface(&self, interface: InterfaceOrientation) {
        let _delivery = lock(&self.delivery);
        let updated = {
            let mut current = lock(&self.current);
            if current.interface == interface {
                return;
            }
            current.interface = interface;
            *current
        };
        self.notify(updated);
    }

    /// Flat and unknown orientations keep the last valid one
    pub fn set_device(&self, device: DeviceOrientation) {
        if !device.is_valid_for_capture() {
            debug!(?device, "Ignoring orientation without a horizon");
            return;
        }
        let _delivery = lock(&self.delivery);
        let updated = {
            let mut current = lock(&self.current);
            if current.device == device {
                return;
            }
            current.device = device;
            *current
        };
        self.notify(updated);
    }

    /// Register `listener` until the returned subscription is dropped
    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(Orientation) + Send + Sync + 'static,
    ) -> Subscription {
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            *next
        };
        lock(&self.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            source: Arc::downgrade(self),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn notify(&self, orientation: Orientation) {
        // Listeners run unlocked so they may subscribe or unsubscribe
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(orientation);
        }
    }

    fn unsubscribe(&self, id: u64) {
        lock(&self.listeners).retain(|(existing, _)| *existing != id);
    }
}

/// Registration handle; unsubscribes on drop
pub struct Subscription {
    id: u64,
    source: Weak<OrientationSource>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.unsubscribe(self.id);
        }
    }
}

fn preview_angle(sensor: SensorRotation, orientation: Orientation) -> f64 {
    ((sensor.degrees() + orientation.interface.offset_degrees()) % 360) as f64
}

fn capture_angle(sensor: SensorRotation, orientation: Orientation) -> f64 {
    ((sensor.degrees() + orientation.device.offset_degrees()) % 360) as f64
}

/// Rotation state bound to one attached video device
pub struct RotationCoordinator {
    sensor: SensorRotation,
    source: Arc<OrientationSource>,
    preview_angle: Arc<Mutex<f64>>,
    _subscription: Subscription,
}

impl RotationCoordinator {
    /// Compute the preview angle, apply it with `apply_preview`, and keep
    /// applying it on every change until dropped
    pub fn new(
        sensor: SensorRotation,
        source: Arc<OrientationSource>,
        apply_preview: impl Fn(f64) + Send + Sync + 'static,
    ) -> Self {
        let initial = preview_angle(sensor, source.current());
        apply_preview(initial);
        debug!(sensor = %sensor, angle = initial, "Rotation coordinator bound");

        let preview = Arc::new(Mutex::new(initial));
        let observed = Arc::clone(&preview);
        let subscription = source.subscribe(move |orientation| {
            let angle = preview_angle(sensor, orientation);
            let changed = {
                let mut current = lock(&observed);
                let changed = *current != angle;
                *current = angle;
                changed
            };
            if changed {
                debug!(angle, "Preview rotation changed");
                apply_preview(angle);
            }
        });

        Self {
            sensor,
            source,
            preview_angle: preview,
            _subscription: subscription,
        }
    }

    /// Angle keeping the preview level with the horizon
    pub fn preview_angle(&self) -> f64 {
        *lock(&self.preview_angle)
    }

    /// Angle for a capture starting now; never cached
    pub fn capture_angle(&self) -> f64 {
        capture_angle(self.sensor, self.source.current())
    }
}
