//! Output assembler.
//!
//! Runs once per job after its last task succeeds. Untiled jobs get their
//! task outputs copied into the job's output directory under the frame
//! naming of the output pattern; tiled jobs get each frame composited from
//! its tiles first. Every file is written to a temporary sibling and
//! renamed into place, so readers never observe a half-written frame.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use helios_core::assembly::{self, TileImage};
use helios_core::decompose::TileRect;
use helios_core::error::CoreError;
use helios_core::settings::{KEY_RESOLUTION_X, KEY_RESOLUTION_Y};
use helios_core::types::DbId;
use helios_db::models::status::JobStatus;
use helios_db::models::task::Task;
use helios_db::repositories::{JobRepo, TaskRepo};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Assemble the final deliverable of a job currently in Assembling.
///
/// On success the job moves to Done with its `output_path` set: a single
/// file for one-frame jobs, the output directory for sequences. Errors
/// propagate to the caller, which fails the job.
pub async fn assemble_job(state: &AppState, job_id: DbId) -> AppResult<()> {
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;
    if job.status_id != JobStatus::Assembling.id() {
        tracing::warn!(job_id, status_id = job.status_id, "Assembly skipped, job moved on");
        return Ok(());
    }

    let tasks = TaskRepo::list_for_job(&state.pool, job_id).await?;
    let out_dir = state.config.storage_root.join("jobs").join(job_id.to_string());
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| AppError::Core(CoreError::Assembly(format!(
            "Cannot create output directory {}: {e}",
            out_dir.display()
        ))))?;

    let mut frame_files = Vec::new();
    if job.tiling.is_some() {
        let (width, height) = job_resolution(&job.settings)?;
        for (frame, tiles) in tasks_by_frame(&tasks)? {
            let dest = out_dir.join(assembly::substitute_frame_number(&job.output_pattern, frame));
            let inputs = tile_inputs(&tiles)?;
            let dest_clone = dest.clone();
            tokio::task::spawn_blocking(move || {
                composite_frame(&inputs, width, height, &dest_clone)
            })
            .await
            .map_err(|e| AppError::InternalError(format!("Assembly task panicked: {e}")))??;
            frame_files.push(dest);
        }
    } else {
        for task in &tasks {
            let source = task_output(task)?;
            let dest = out_dir.join(assembly::substitute_frame_number(
                &job.output_pattern,
                task.frame,
            ));
            copy_into_place(Path::new(source), &dest).await?;
            frame_files.push(dest);
        }
    }

    let output_path = match frame_files.as_slice() {
        [single] => single.clone(),
        _ => out_dir.clone(),
    };
    let output_str = output_path.to_string_lossy().into_owned();

    match JobRepo::complete(&state.pool, job_id, &output_str).await? {
        Some(_) => {
            tracing::info!(job_id, output = %output_str, frames = frame_files.len(), "Job assembled");
        }
        // The job was canceled while we were compositing.
        None => {
            tracing::warn!(job_id, "Assembly finished but job is no longer assembling");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Group done tasks by frame, preserving tile order within a frame.
fn tasks_by_frame(tasks: &[Task]) -> Result<BTreeMap<i32, Vec<&Task>>, AppError> {
    let mut by_frame: BTreeMap<i32, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        by_frame.entry(task.frame).or_default().push(task);
    }
    Ok(by_frame)
}

/// Pull the output path out of a task, which must have reported success.
fn task_output(task: &Task) -> Result<&str, AppError> {
    task.output_path.as_deref().ok_or_else(|| {
        AppError::Core(CoreError::Assembly(format!(
            "Task {} has no output path",
            task.id
        )))
    })
}

/// Pair each tile task's rect with its output file.
fn tile_inputs(tasks: &[&Task]) -> Result<Vec<(TileRect, PathBuf)>, AppError> {
    tasks
        .iter()
        .map(|task| {
            let rect = match (task.tile_x, task.tile_y, task.tile_width, task.tile_height) {
                (Some(x), Some(y), Some(w), Some(h)) => TileRect {
                    x: x as u32,
                    y: y as u32,
                    width: w as u32,
                    height: h as u32,
                },
                _ => {
                    return Err(AppError::Core(CoreError::Assembly(format!(
                        "Task {} of a tiled job has no tile rect",
                        task.id
                    ))))
                }
            };
            Ok((rect, PathBuf::from(task_output(task)?)))
        })
        .collect()
}

/// Read the frame resolution out of a job's stored settings.
fn job_resolution(settings: &serde_json::Value) -> Result<(u32, u32), AppError> {
    let dim = |key: &str| -> Result<u32, AppError> {
        settings
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                AppError::Core(CoreError::Assembly(format!(
                    "Tiled job is missing the {key} setting"
                )))
            })
    };
    Ok((dim(KEY_RESOLUTION_X)?, dim(KEY_RESOLUTION_Y)?))
}

/// Load tile images, composite them, and write the frame atomically.
///
/// Synchronous by design; callers run it on the blocking pool.
fn composite_frame(
    inputs: &[(TileRect, PathBuf)],
    width: u32,
    height: u32,
    dest: &Path,
) -> Result<(), AppError> {
    let mut tiles = Vec::with_capacity(inputs.len());
    for (rect, path) in inputs {
        let image = image::open(path)
            .map_err(|e| {
                AppError::Core(CoreError::Assembly(format!(
                    "Cannot read tile {}: {e}",
                    path.display()
                )))
            })?
            .to_rgba8();
        tiles.push(TileImage { rect: *rect, image });
    }

    let frame = assembly::composite_tiles(width, height, &tiles)?;

    let tmp = temp_sibling(dest);
    // The `.part` suffix hides the real extension, so the format must be
    // given explicitly.
    frame.save_with_format(&tmp, image::ImageFormat::Png).map_err(|e| {
        AppError::Core(CoreError::Assembly(format!(
            "Cannot write frame {}: {e}",
            tmp.display()
        )))
    })?;
    std::fs::rename(&tmp, dest).map_err(|e| {
        AppError::Core(CoreError::Assembly(format!(
            "Cannot publish frame {}: {e}",
            dest.display()
        )))
    })?;
    Ok(())
}

/// Copy a task output into the job directory via a temporary sibling.
async fn copy_into_place(source: &Path, dest: &Path) -> Result<(), AppError> {
    let tmp = temp_sibling(dest);
    tokio::fs::copy(source, &tmp).await.map_err(|e| {
        AppError::Core(CoreError::Assembly(format!(
            "Cannot copy {} to {}: {e}",
            source.display(),
            tmp.display()
        )))
    })?;
    tokio::fs::rename(&tmp, dest).await.map_err(|e| {
        AppError::Core(CoreError::Assembly(format!(
            "Cannot publish {}: {e}",
            dest.display()
        )))
    })?;
    Ok(())
}

/// `foo.png` -> `foo.png.part`, in the same directory so the final rename
/// stays on one filesystem.
fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn temp_sibling_stays_in_directory() {
        let tmp = temp_sibling(Path::new("/out/jobs/7/frame_0001.png"));
        assert_eq!(tmp, Path::new("/out/jobs/7/frame_0001.png.part"));
    }

    #[test]
    fn job_resolution_reads_string_settings() {
        let settings = serde_json::json!({
            "render.resolution_x": "1920",
            "render.resolution_y": "1080",
        });
        assert_eq!(job_resolution(&settings).unwrap(), (1920, 1080));
    }

    #[test]
    fn job_resolution_missing_key_fails() {
        let settings = serde_json::json!({"render.resolution_x": "1920"});
        assert!(job_resolution(&settings).is_err());
    }

    #[test]
    fn composite_frame_writes_assembled_png() {
        let dir = tempfile::tempdir().unwrap();
        let left_path = dir.path().join("left.png");
        let right_path = dir.path().join("right.png");
        RgbaImage::from_pixel(2, 4, Rgba([255, 0, 0, 255]))
            .save(&left_path)
            .unwrap();
        RgbaImage::from_pixel(2, 4, Rgba([0, 0, 255, 255]))
            .save(&right_path)
            .unwrap();

        let inputs = vec![
            (TileRect { x: 0, y: 0, width: 2, height: 4 }, left_path),
            (TileRect { x: 2, y: 0, width: 2, height: 4 }, right_path),
        ];
        let dest = dir.path().join("frame_0001.png");
        composite_frame(&inputs, 4, 4, &dest).unwrap();

        let frame = image::open(&dest).unwrap().to_rgba8();
        assert_eq!(frame.dimensions(), (4, 4));
        assert_eq!(*frame.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*frame.get_pixel(3, 0), Rgba([0, 0, 255, 255]));
        // No leftover temporary file.
        assert!(!dest.with_file_name("frame_0001.png.part").exists());
    }

    #[test]
    fn composite_frame_dimension_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tile_path = dir.path().join("tile.png");
        RgbaImage::from_pixel(3, 4, Rgba([0, 0, 0, 255]))
            .save(&tile_path)
            .unwrap();

        let inputs = vec![(TileRect { x: 0, y: 0, width: 4, height: 4 }, tile_path)];
        let dest = dir.path().join("frame.png");
        assert!(composite_frame(&inputs, 4, 4, &dest).is_err());
        assert!(!dest.exists());
    }
}
