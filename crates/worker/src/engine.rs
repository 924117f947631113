//! Render process construction and execution.
//!
//! Turns a claimed task into a headless renderer invocation: the scene
//! file, the engine flag, an output prefix, and a generated expression
//! that applies the task's settings (resolution, tile borders, samples,
//! device) inside the renderer before the frame is rendered.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use helios_core::assembly::substitute_frame_number;
use helios_core::capability::{resolve_device, RenderDevice};
use helios_core::settings::{
    apply_resolved_device, RenderSettings, KEY_BORDER_MAX_X, KEY_BORDER_MAX_Y, KEY_BORDER_MIN_X,
    KEY_BORDER_MIN_Y, KEY_CYCLES_DEVICE, KEY_RENDER_ENGINE, KEY_RESOLUTION_X, KEY_RESOLUTION_Y,
    KEY_SAMPLES, KEY_USE_BORDER,
};

use crate::error::WorkerError;

/// Default engine when a job does not pin one.
const DEFAULT_ENGINE: &str = "CYCLES";
/// Output prefix handed to the renderer; the `####` run becomes the
/// zero-padded frame number.
const OUTPUT_PREFIX: &str = "frame_####";

/// A fully resolved renderer invocation for one task.
#[derive(Debug)]
pub struct RenderPlan {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// File the renderer will produce on success.
    pub output_file: PathBuf,
}

/// Build the invocation for one frame.
///
/// `requested` is the job's device class; ANY resolves against the
/// worker's GPU count here, and the resolved device is pinned into the
/// settings expression.
pub fn build_plan(
    executable: PathBuf,
    scene_path: &str,
    out_dir: &Path,
    frame: i32,
    settings: &RenderSettings,
    requested: RenderDevice,
    gpu_count: i32,
) -> RenderPlan {
    let mut settings = settings.clone();
    apply_resolved_device(&mut settings, resolve_device(requested, gpu_count));

    let engine = settings
        .get(KEY_RENDER_ENGINE)
        .map(String::as_str)
        .unwrap_or(DEFAULT_ENGINE)
        .to_string();

    let out_prefix = out_dir.join(OUTPUT_PREFIX);
    let output_file = out_dir.join(substitute_frame_number(
        &format!("{OUTPUT_PREFIX}.png"),
        frame,
    ));

    let args = vec![
        "-b".to_string(),
        scene_path.to_string(),
        "-E".to_string(),
        engine,
        "-o".to_string(),
        out_prefix.to_string_lossy().into_owned(),
        "-F".to_string(),
        "PNG".to_string(),
        "--python-expr".to_string(),
        settings_expr(&settings),
        "-f".to_string(),
        frame.to_string(),
    ];

    RenderPlan {
        executable,
        args,
        output_file,
    }
}

/// Translate a settings map into a scene-configuration expression the
/// renderer evaluates before rendering.
///
/// Only well-known keys are translated; unknown keys within valid
/// namespaces are ignored rather than rejected, since validation
/// happened at submission.
pub fn settings_expr(settings: &RenderSettings) -> String {
    let mut stmts = vec!["import bpy".to_string(), "s = bpy.context.scene".to_string()];

    for key in [KEY_RESOLUTION_X, KEY_RESOLUTION_Y] {
        if let Some(value) = settings.get(key) {
            let attr = key.rsplit('.').next().unwrap_or(key);
            stmts.push(format!("s.render.{attr} = {value}"));
        }
    }
    stmts.push("s.render.resolution_percentage = 100".to_string());

    if settings.get(KEY_USE_BORDER).map(String::as_str) == Some("true") {
        stmts.push("s.render.use_border = True".to_string());
        stmts.push("s.render.use_crop_to_border = True".to_string());
        for key in [
            KEY_BORDER_MIN_X,
            KEY_BORDER_MAX_X,
            KEY_BORDER_MIN_Y,
            KEY_BORDER_MAX_Y,
        ] {
            if let Some(value) = settings.get(key) {
                let attr = key.rsplit('.').next().unwrap_or(key);
                stmts.push(format!("s.render.{attr} = {value}"));
            }
        }
    }

    if let Some(samples) = settings.get(KEY_SAMPLES) {
        stmts.push(format!("s.cycles.samples = {samples}"));
    }
    if let Some(device) = settings.get(KEY_CYCLES_DEVICE) {
        stmts.push(format!("s.cycles.device = '{device}'"));
    }

    stmts.join("; ")
}

/// Run a render plan to completion, enforcing the time budget.
///
/// The child is killed when the timeout fires. On success the plan's
/// output file is verified to exist before returning it.
pub async fn run_render(plan: &RenderPlan, timeout_secs: u64) -> Result<PathBuf, WorkerError> {
    tracing::info!(
        executable = %plan.executable.display(),
        output = %plan.output_file.display(),
        "Launching render",
    );

    let child = tokio::process::Command::new(&plan.executable)
        .args(&plan.args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| WorkerError::io(&plan.executable, e))?;

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| WorkerError::RenderTimeout(timeout_secs))?
        .map_err(|e| WorkerError::io(&plan.executable, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkerError::Render(format!(
            "Renderer exited with {}: {}",
            output.status,
            stderr_tail(&stderr),
        )));
    }

    if !plan.output_file.exists() {
        return Err(WorkerError::Render(format!(
            "Renderer exited cleanly but produced no output at {}",
            plan.output_file.display()
        )));
    }

    Ok(plan.output_file.clone())
}

/// Last few lines of stderr for error reporting.
fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 5;
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> RenderSettings {
        let mut s = RenderSettings::new();
        s.insert(KEY_RENDER_ENGINE.to_string(), "CYCLES".to_string());
        s.insert(KEY_RESOLUTION_X.to_string(), "1920".to_string());
        s.insert(KEY_RESOLUTION_Y.to_string(), "1080".to_string());
        s.insert(KEY_SAMPLES.to_string(), "64".to_string());
        s
    }

    #[test]
    fn plan_names_padded_output_file() {
        let plan = build_plan(
            PathBuf::from("/cache/blender"),
            "/shared/scene.blend",
            Path::new("/work/tasks/9"),
            17,
            &base_settings(),
            RenderDevice::Cpu,
            0,
        );
        assert_eq!(plan.output_file, Path::new("/work/tasks/9/frame_0017.png"));
    }

    #[test]
    fn plan_renders_exactly_one_frame() {
        let plan = build_plan(
            PathBuf::from("/cache/blender"),
            "/shared/scene.blend",
            Path::new("/work"),
            3,
            &base_settings(),
            RenderDevice::Cpu,
            0,
        );
        let f = plan.args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(plan.args[f + 1], "3");
    }

    #[test]
    fn plan_pins_resolved_device() {
        let plan = build_plan(
            PathBuf::from("/cache/blender"),
            "/shared/scene.blend",
            Path::new("/work"),
            1,
            &base_settings(),
            RenderDevice::Any,
            2,
        );
        let e = plan.args.iter().position(|a| a == "--python-expr").unwrap();
        // ANY on a GPU host resolves to GPU.
        assert!(plan.args[e + 1].contains("s.cycles.device = 'GPU'"));
    }

    #[test]
    fn expr_applies_borders_when_enabled() {
        let mut s = base_settings();
        s.insert(KEY_USE_BORDER.to_string(), "true".to_string());
        s.insert(KEY_BORDER_MIN_X.to_string(), "0".to_string());
        s.insert(KEY_BORDER_MAX_X.to_string(), "0.5".to_string());
        s.insert(KEY_BORDER_MIN_Y.to_string(), "0.5".to_string());
        s.insert(KEY_BORDER_MAX_Y.to_string(), "1".to_string());

        let expr = settings_expr(&s);
        assert!(expr.contains("s.render.use_border = True"));
        assert!(expr.contains("s.render.border_max_x = 0.5"));
    }

    #[test]
    fn expr_skips_borders_when_disabled() {
        let expr = settings_expr(&base_settings());
        assert!(!expr.contains("use_border"));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let long: String = (0..20).map(|i| format!("line{i}\n")).collect();
        let tail = stderr_tail(&long);
        assert!(tail.contains("line19"));
        assert!(!tail.contains("line10 "));
    }
}
