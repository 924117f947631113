//! Render settings: namespaced key/value pairs attached to a job.
//!
//! Settings are stored as a flat string map (`render.*` for the renderer
//! proper, `cycles.*` for the Cycles engine) and copied onto each task at
//! decomposition time, with the border keys rewritten per tile.

use std::collections::BTreeMap;

use crate::capability::RenderDevice;
use crate::decompose::TileRect;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Well-known keys
// ---------------------------------------------------------------------------

pub const KEY_RENDER_ENGINE: &str = "render.engine";
pub const KEY_RESOLUTION_X: &str = "render.resolution_x";
pub const KEY_RESOLUTION_Y: &str = "render.resolution_y";
pub const KEY_USE_BORDER: &str = "render.use_border";
pub const KEY_BORDER_MIN_X: &str = "render.border_min_x";
pub const KEY_BORDER_MAX_X: &str = "render.border_max_x";
pub const KEY_BORDER_MIN_Y: &str = "render.border_min_y";
pub const KEY_BORDER_MAX_Y: &str = "render.border_max_y";
pub const KEY_SAMPLES: &str = "cycles.samples";
pub const KEY_CYCLES_DEVICE: &str = "cycles.device";

/// Engines the farm knows how to drive.
pub const VALID_ENGINES: &[&str] = &["CYCLES", "BLENDER_EEVEE", "BLENDER_WORKBENCH"];

const VALID_NAMESPACES: &[&str] = &["render.", "cycles."];

/// Flat string map of render settings.
pub type RenderSettings = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a settings map at job submission.
///
/// Rules:
/// - Every key must live under a known namespace (`render.` or `cycles.`).
/// - Values must not be empty.
/// - The engine, if present, must be one of `VALID_ENGINES`.
/// - Resolution and sample keys, if present, must parse as positive integers.
pub fn validate_settings(settings: &RenderSettings) -> Result<(), CoreError> {
    for (key, value) in settings {
        if !VALID_NAMESPACES.iter().any(|ns| key.starts_with(ns)) {
            return Err(CoreError::Validation(format!(
                "Unknown settings namespace for key: {key}"
            )));
        }
        if value.is_empty() {
            return Err(CoreError::Validation(format!(
                "Settings key {key} has an empty value"
            )));
        }
    }

    if let Some(engine) = settings.get(KEY_RENDER_ENGINE) {
        if !VALID_ENGINES.contains(&engine.as_str()) {
            return Err(CoreError::Validation(format!(
                "Unknown render engine: {engine}"
            )));
        }
    }

    for key in [KEY_RESOLUTION_X, KEY_RESOLUTION_Y, KEY_SAMPLES] {
        if let Some(value) = settings.get(key) {
            match value.parse::<u32>() {
                Ok(n) if n > 0 => {}
                _ => {
                    return Err(CoreError::Validation(format!(
                        "Settings key {key} must be a positive integer, got: {value}"
                    )));
                }
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Per-task rewrites
// ---------------------------------------------------------------------------

/// Rewrite the border keys of `settings` so the renderer produces only the
/// given tile.
///
/// Tile rects use image coordinates (origin top-left); render borders use
/// normalized renderer coordinates (origin bottom-left), so the Y axis is
/// flipped here.
pub fn apply_tile_borders(
    settings: &mut RenderSettings,
    rect: &TileRect,
    frame_width: u32,
    frame_height: u32,
) {
    let w = frame_width as f64;
    let h = frame_height as f64;
    let min_x = rect.x as f64 / w;
    let max_x = (rect.x + rect.width) as f64 / w;
    let min_y = 1.0 - (rect.y + rect.height) as f64 / h;
    let max_y = 1.0 - rect.y as f64 / h;

    settings.insert(KEY_USE_BORDER.to_string(), "true".to_string());
    settings.insert(KEY_BORDER_MIN_X.to_string(), format!("{min_x}"));
    settings.insert(KEY_BORDER_MAX_X.to_string(), format!("{max_x}"));
    settings.insert(KEY_BORDER_MIN_Y.to_string(), format!("{min_y}"));
    settings.insert(KEY_BORDER_MAX_Y.to_string(), format!("{max_y}"));
}

/// Pin `cycles.device` to the device the claiming worker resolved.
pub fn apply_resolved_device(settings: &mut RenderSettings, device: RenderDevice) {
    settings.insert(KEY_CYCLES_DEVICE.to_string(), device.as_str().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn base_settings() -> RenderSettings {
        let mut s = RenderSettings::new();
        s.insert(KEY_RENDER_ENGINE.to_string(), "CYCLES".to_string());
        s.insert(KEY_RESOLUTION_X.to_string(), "1920".to_string());
        s.insert(KEY_RESOLUTION_Y.to_string(), "1080".to_string());
        s.insert(KEY_SAMPLES.to_string(), "128".to_string());
        s
    }

    #[test]
    fn valid_settings_pass() {
        assert!(validate_settings(&base_settings()).is_ok());
    }

    #[test]
    fn empty_map_is_valid() {
        assert!(validate_settings(&RenderSettings::new()).is_ok());
    }

    #[test]
    fn unknown_namespace_rejected() {
        let mut s = base_settings();
        s.insert("compositor.enabled".to_string(), "true".to_string());
        assert_matches!(validate_settings(&s), Err(CoreError::Validation(_)));
    }

    #[test]
    fn empty_value_rejected() {
        let mut s = base_settings();
        s.insert(KEY_SAMPLES.to_string(), String::new());
        assert_matches!(validate_settings(&s), Err(CoreError::Validation(_)));
    }

    #[test]
    fn unknown_engine_rejected() {
        let mut s = base_settings();
        s.insert(KEY_RENDER_ENGINE.to_string(), "LUXRENDER".to_string());
        assert_matches!(validate_settings(&s), Err(CoreError::Validation(_)));
    }

    #[test]
    fn zero_resolution_rejected() {
        let mut s = base_settings();
        s.insert(KEY_RESOLUTION_X.to_string(), "0".to_string());
        assert_matches!(validate_settings(&s), Err(CoreError::Validation(_)));
    }

    #[test]
    fn non_numeric_samples_rejected() {
        let mut s = base_settings();
        s.insert(KEY_SAMPLES.to_string(), "many".to_string());
        assert_matches!(validate_settings(&s), Err(CoreError::Validation(_)));
    }

    #[test]
    fn tile_borders_flip_y_axis() {
        // Top-left quadrant of a 2x2 grid covers the upper half of the
        // normalized Y range.
        let mut s = base_settings();
        let rect = TileRect {
            x: 0,
            y: 0,
            width: 960,
            height: 540,
        };
        apply_tile_borders(&mut s, &rect, 1920, 1080);
        assert_eq!(s[KEY_USE_BORDER], "true");
        assert_eq!(s[KEY_BORDER_MIN_X], "0");
        assert_eq!(s[KEY_BORDER_MAX_X], "0.5");
        assert_eq!(s[KEY_BORDER_MIN_Y], "0.5");
        assert_eq!(s[KEY_BORDER_MAX_Y], "1");
    }

    #[test]
    fn bottom_right_tile_reaches_full_extent() {
        let mut s = RenderSettings::new();
        let rect = TileRect {
            x: 960,
            y: 540,
            width: 960,
            height: 540,
        };
        apply_tile_borders(&mut s, &rect, 1920, 1080);
        assert_eq!(s[KEY_BORDER_MIN_X], "0.5");
        assert_eq!(s[KEY_BORDER_MAX_X], "1");
        assert_eq!(s[KEY_BORDER_MIN_Y], "0");
        assert_eq!(s[KEY_BORDER_MAX_Y], "0.5");
    }

    #[test]
    fn resolved_device_is_pinned() {
        let mut s = RenderSettings::new();
        apply_resolved_device(&mut s, RenderDevice::Gpu);
        assert_eq!(s[KEY_CYCLES_DEVICE], "GPU");
    }
}
