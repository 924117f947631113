//! Job decomposition: frame ranges, tile grids, and task blueprints.
//!
//! A job is split into tasks at submission time. The split is pure and
//! deterministic so the API layer can create every task row in a single
//! transaction and a resubmitted job always produces the same task set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::settings::{self, RenderSettings, KEY_RESOLUTION_X, KEY_RESOLUTION_Y};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum columns or rows in a tile grid.
pub const MAX_GRID_DIM: u32 = 16;

/// Maximum tasks a single job may decompose into.
pub const MAX_TASKS_PER_JOB: usize = 10_000;

// ---------------------------------------------------------------------------
// Frame range
// ---------------------------------------------------------------------------

/// Inclusive frame range with a positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i32,
    pub end: i32,
    pub step: i32,
}

impl FrameRange {
    pub fn new(start: i32, end: i32, step: i32) -> Result<Self, CoreError> {
        if step < 1 {
            return Err(CoreError::Validation(format!(
                "Frame step must be at least 1, got {step}"
            )));
        }
        if end < start {
            return Err(CoreError::Validation(format!(
                "Frame range end ({end}) must not precede start ({start})"
            )));
        }
        Ok(Self { start, end, step })
    }

    /// Frames in ascending order. The end frame is included only when the
    /// step lands on it.
    pub fn frames(&self) -> Vec<i32> {
        (self.start..=self.end).step_by(self.step as usize).collect()
    }

    pub fn count(&self) -> usize {
        ((self.end - self.start) / self.step + 1) as usize
    }
}

// ---------------------------------------------------------------------------
// Tile grid
// ---------------------------------------------------------------------------

/// Tile grid shape, parsed from the `"COLSxROWS"` form (for example `"2x2"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingConfig {
    pub cols: u32,
    pub rows: u32,
}

impl TilingConfig {
    pub fn tile_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }
}

impl fmt::Display for TilingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl FromStr for TilingConfig {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid tiling config: {s} (expected COLSxROWS, e.g. 2x2)"));
        let (cols, rows) = s.split_once('x').ok_or_else(invalid)?;
        let cols: u32 = cols.parse().map_err(|_| invalid())?;
        let rows: u32 = rows.parse().map_err(|_| invalid())?;
        if cols == 0 || rows == 0 {
            return Err(invalid());
        }
        if cols > MAX_GRID_DIM || rows > MAX_GRID_DIM {
            return Err(CoreError::Validation(format!(
                "Tiling config {s} exceeds the {MAX_GRID_DIM}x{MAX_GRID_DIM} grid limit"
            )));
        }
        Ok(Self { cols, rows })
    }
}

/// Pixel rectangle of one tile in image coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One cell of a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub col: u32,
    pub row: u32,
    pub rect: TileRect,
}

/// Label used in per-tile output filenames, e.g. `_Tile_0_1` for row 0,
/// column 1.
pub fn tile_label(col: u32, row: u32) -> String {
    format!("_Tile_{row}_{col}")
}

/// Split a frame into a grid of pixel rectangles.
///
/// Column widths are `frame_width / cols` rounded down; the last column
/// absorbs the remainder so the rects tile the frame exactly. Rows work the
/// same way. Tiles are emitted row-major (row 0 first, columns left to
/// right).
pub fn tile_grid(
    frame_width: u32,
    frame_height: u32,
    tiling: TilingConfig,
) -> Result<Vec<Tile>, CoreError> {
    if tiling.cols > frame_width || tiling.rows > frame_height {
        return Err(CoreError::Validation(format!(
            "Tile grid {tiling} does not fit a {frame_width}x{frame_height} frame"
        )));
    }

    let base_w = frame_width / tiling.cols;
    let base_h = frame_height / tiling.rows;

    let mut tiles = Vec::with_capacity(tiling.tile_count());
    for row in 0..tiling.rows {
        for col in 0..tiling.cols {
            let x = col * base_w;
            let y = row * base_h;
            let width = if col == tiling.cols - 1 {
                frame_width - x
            } else {
                base_w
            };
            let height = if row == tiling.rows - 1 {
                frame_height - y
            } else {
                base_h
            };
            tiles.push(Tile {
                col,
                row,
                rect: TileRect {
                    x,
                    y,
                    width,
                    height,
                },
            });
        }
    }
    Ok(tiles)
}

// ---------------------------------------------------------------------------
// Decomposition
// ---------------------------------------------------------------------------

/// Everything needed to create one task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBlueprint {
    pub frame: i32,
    pub tile: Option<Tile>,
    pub settings: RenderSettings,
}

/// Split a job into its task blueprints.
///
/// Without tiling this is one task per frame carrying the job settings
/// unchanged. With tiling, each frame is further split into grid cells and
/// each blueprint's settings get the border keys rewritten for its rect.
/// Tiling requires `render.resolution_x`/`render.resolution_y` in the
/// settings so the grid can be computed.
///
/// Blueprints are ordered frame-major, then row-major within a frame, so
/// task IDs assigned in insertion order give FIFO claim order.
pub fn decompose(
    frames: &FrameRange,
    tiling: Option<TilingConfig>,
    base_settings: &RenderSettings,
) -> Result<Vec<TaskBlueprint>, CoreError> {
    let frame_list = frames.frames();

    let grid = match tiling {
        None => None,
        Some(tiling) => {
            let width = resolution_setting(base_settings, KEY_RESOLUTION_X)?;
            let height = resolution_setting(base_settings, KEY_RESOLUTION_Y)?;
            Some((tile_grid(width, height, tiling)?, width, height))
        }
    };

    let per_frame = grid.as_ref().map_or(1, |(tiles, _, _)| tiles.len());
    let total = frame_list.len() * per_frame;
    if total > MAX_TASKS_PER_JOB {
        return Err(CoreError::Validation(format!(
            "Job would decompose into {total} tasks, exceeding the limit of {MAX_TASKS_PER_JOB}"
        )));
    }

    let mut blueprints = Vec::with_capacity(total);
    match grid {
        None => {
            for frame in frame_list {
                blueprints.push(TaskBlueprint {
                    frame,
                    tile: None,
                    settings: base_settings.clone(),
                });
            }
        }
        Some((tiles, width, height)) => {
            for frame in frame_list {
                for tile in &tiles {
                    let mut task_settings = base_settings.clone();
                    settings::apply_tile_borders(&mut task_settings, &tile.rect, width, height);
                    blueprints.push(TaskBlueprint {
                        frame,
                        tile: Some(*tile),
                        settings: task_settings,
                    });
                }
            }
        }
    }
    Ok(blueprints)
}

fn resolution_setting(settings: &RenderSettings, key: &str) -> Result<u32, CoreError> {
    let value = settings.get(key).ok_or_else(|| {
        CoreError::Validation(format!("Tiled jobs require the {key} setting"))
    })?;
    value.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
        CoreError::Validation(format!(
            "Settings key {key} must be a positive integer, got: {value}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{KEY_BORDER_MAX_X, KEY_BORDER_MIN_X, KEY_USE_BORDER};
    use assert_matches::assert_matches;

    // -----------------------------------------------------------------------
    // Frame ranges
    // -----------------------------------------------------------------------

    #[test]
    fn single_frame_range() {
        let r = FrameRange::new(1, 1, 1).unwrap();
        assert_eq!(r.frames(), vec![1]);
        assert_eq!(r.count(), 1);
    }

    #[test]
    fn step_skips_frames() {
        let r = FrameRange::new(1, 10, 3).unwrap();
        assert_eq!(r.frames(), vec![1, 4, 7, 10]);
        assert_eq!(r.count(), 4);
    }

    #[test]
    fn step_may_overshoot_the_end() {
        let r = FrameRange::new(1, 9, 3).unwrap();
        assert_eq!(r.frames(), vec![1, 4, 7]);
        assert_eq!(r.count(), 3);
    }

    #[test]
    fn negative_frames_are_allowed() {
        let r = FrameRange::new(-5, -3, 1).unwrap();
        assert_eq!(r.frames(), vec![-5, -4, -3]);
    }

    #[test]
    fn zero_step_rejected() {
        assert_matches!(FrameRange::new(1, 10, 0), Err(CoreError::Validation(_)));
    }

    #[test]
    fn inverted_range_rejected() {
        assert_matches!(FrameRange::new(10, 1, 1), Err(CoreError::Validation(_)));
    }

    // -----------------------------------------------------------------------
    // Tiling config parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parses_square_grid() {
        let t: TilingConfig = "2x2".parse().unwrap();
        assert_eq!(t, TilingConfig { cols: 2, rows: 2 });
        assert_eq!(t.tile_count(), 4);
    }

    #[test]
    fn parses_rectangular_grid() {
        let t: TilingConfig = "4x2".parse().unwrap();
        assert_eq!(t.cols, 4);
        assert_eq!(t.rows, 2);
    }

    #[test]
    fn rejects_zero_dimension() {
        assert_matches!("0x2".parse::<TilingConfig>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert_matches!("2by2".parse::<TilingConfig>(), Err(CoreError::Validation(_)));
        assert_matches!("".parse::<TilingConfig>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_oversized_grid() {
        assert_matches!("17x2".parse::<TilingConfig>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn display_round_trips() {
        let t: TilingConfig = "8x4".parse().unwrap();
        assert_eq!(t.to_string(), "8x4");
    }

    // -----------------------------------------------------------------------
    // Tile grids
    // -----------------------------------------------------------------------

    #[test]
    fn even_grid_splits_exactly() {
        let tiles = tile_grid(1920, 1080, "2x2".parse().unwrap()).unwrap();
        assert_eq!(tiles.len(), 4);
        assert_eq!(
            tiles[0].rect,
            TileRect { x: 0, y: 0, width: 960, height: 540 }
        );
        assert_eq!(
            tiles[3].rect,
            TileRect { x: 960, y: 540, width: 960, height: 540 }
        );
    }

    #[test]
    fn tiles_are_row_major() {
        let tiles = tile_grid(100, 100, "2x2".parse().unwrap()).unwrap();
        assert_eq!((tiles[0].col, tiles[0].row), (0, 0));
        assert_eq!((tiles[1].col, tiles[1].row), (1, 0));
        assert_eq!((tiles[2].col, tiles[2].row), (0, 1));
        assert_eq!((tiles[3].col, tiles[3].row), (1, 1));
    }

    #[test]
    fn last_column_absorbs_remainder() {
        let tiles = tile_grid(1921, 1080, "2x2".parse().unwrap()).unwrap();
        assert_eq!(tiles[0].rect.width, 960);
        assert_eq!(tiles[1].rect.width, 961);
        assert_eq!(tiles[1].rect.x, 960);
    }

    #[test]
    fn last_row_absorbs_remainder() {
        let tiles = tile_grid(100, 101, "2x2".parse().unwrap()).unwrap();
        assert_eq!(tiles[0].rect.height, 50);
        assert_eq!(tiles[2].rect.height, 51);
        assert_eq!(tiles[2].rect.y, 50);
    }

    #[test]
    fn rects_cover_the_frame() {
        let tiles = tile_grid(1921, 1079, "3x3".parse().unwrap()).unwrap();
        let area: u64 = tiles
            .iter()
            .map(|t| t.rect.width as u64 * t.rect.height as u64)
            .sum();
        assert_eq!(area, 1921 * 1079);
    }

    #[test]
    fn grid_larger_than_frame_rejected() {
        assert_matches!(
            tile_grid(3, 3, "4x4".parse().unwrap()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn tile_label_is_row_then_col() {
        assert_eq!(tile_label(1, 0), "_Tile_0_1");
    }

    // -----------------------------------------------------------------------
    // Decomposition
    // -----------------------------------------------------------------------

    fn settings_1080p() -> RenderSettings {
        let mut s = RenderSettings::new();
        s.insert(KEY_RESOLUTION_X.to_string(), "1920".to_string());
        s.insert(KEY_RESOLUTION_Y.to_string(), "1080".to_string());
        s
    }

    #[test]
    fn per_frame_produces_one_task_per_frame() {
        let frames = FrameRange::new(1, 5, 1).unwrap();
        let tasks = decompose(&frames, None, &settings_1080p()).unwrap();
        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0].frame, 1);
        assert_eq!(tasks[4].frame, 5);
        assert!(tasks.iter().all(|t| t.tile.is_none()));
    }

    #[test]
    fn untiled_tasks_keep_settings_unchanged() {
        let frames = FrameRange::new(1, 1, 1).unwrap();
        let tasks = decompose(&frames, None, &settings_1080p()).unwrap();
        assert_eq!(tasks[0].settings, settings_1080p());
        assert!(!tasks[0].settings.contains_key(KEY_USE_BORDER));
    }

    #[test]
    fn tiled_single_frame_produces_grid_tasks() {
        let frames = FrameRange::new(7, 7, 1).unwrap();
        let tasks = decompose(&frames, Some("2x2".parse().unwrap()), &settings_1080p()).unwrap();
        assert_eq!(tasks.len(), 4);
        assert!(tasks.iter().all(|t| t.frame == 7));
        assert!(tasks.iter().all(|t| t.tile.is_some()));
        assert_eq!(tasks[0].settings[KEY_USE_BORDER], "true");
    }

    #[test]
    fn tiled_tasks_get_distinct_borders() {
        let frames = FrameRange::new(1, 1, 1).unwrap();
        let tasks = decompose(&frames, Some("2x1".parse().unwrap()), &settings_1080p()).unwrap();
        assert_eq!(tasks[0].settings[KEY_BORDER_MIN_X], "0");
        assert_eq!(tasks[0].settings[KEY_BORDER_MAX_X], "0.5");
        assert_eq!(tasks[1].settings[KEY_BORDER_MIN_X], "0.5");
        assert_eq!(tasks[1].settings[KEY_BORDER_MAX_X], "1");
    }

    #[test]
    fn frames_and_tiles_multiply() {
        let frames = FrameRange::new(1, 3, 1).unwrap();
        let tasks = decompose(&frames, Some("2x2".parse().unwrap()), &settings_1080p()).unwrap();
        assert_eq!(tasks.len(), 12);
        // Frame-major ordering.
        assert_eq!(tasks[0].frame, 1);
        assert_eq!(tasks[3].frame, 1);
        assert_eq!(tasks[4].frame, 2);
    }

    #[test]
    fn tiling_without_resolution_rejected() {
        let frames = FrameRange::new(1, 1, 1).unwrap();
        let result = decompose(&frames, Some("2x2".parse().unwrap()), &RenderSettings::new());
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn oversized_job_rejected() {
        let frames = FrameRange::new(1, 100_000, 1).unwrap();
        let result = decompose(&frames, None, &settings_1080p());
        assert_matches!(result, Err(CoreError::Validation(_)));
    }
}
