use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cvlab_core::Picture;
use cvlab_imgproc::ThresholdType;
use cvlab_studio::{
    ChangeOutcome, DisplaySurface, ParamValue, RawValue, Shell, StudioError,
};
use cvlab_videoio::{FrameSource, PngSequenceSource, VideoError};
use image::{GrayImage, Luma};
use tempfile::tempdir;

/// Display double that records everything presented.
#[derive(Clone, Default)]
struct Recorder {
    frames: Arc<Mutex<Vec<Picture>>>,
}

impl Recorder {
    fn last(&self) -> Option<Picture> {
        self.frames.lock().unwrap().last().cloned()
    }

    fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl DisplaySurface for Recorder {
    fn present(&mut self, picture: &Picture) {
        self.frames.lock().unwrap().push(picture.clone());
    }
}

fn recording_shell() -> (Shell, Recorder) {
    let recorder = Recorder::default();
    (Shell::new(Box::new(recorder.clone())), recorder)
}

fn gradient_image() -> GrayImage {
    let mut img = GrayImage::new(32, 32);
    for y in 0..32 {
        for x in 0..32 {
            img.put_pixel(x, y, Luma([(x * 8) as u8]));
        }
    }
    img
}

/// Loads the image through a real file; the returned guard keeps the
/// backing directory (the shell's remembered save path) alive.
fn load_gray(shell: &mut Shell, img: &GrayImage) -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.png");
    img.save(&path).unwrap();
    shell.load_image(&path).unwrap();
    dir
}

#[test]
fn open_without_source_image_is_a_warning_level_no_op() {
    let mut shell = Shell::headless();

    let result = shell.open_panel("Thresholding");
    assert!(matches!(result, Err(StudioError::NoSourceImage)));

    assert_eq!(shell.open_panels().count(), 0);
    assert!(shell.state().base().is_none());
    assert!(shell.state().output().is_none());
}

#[test]
fn unknown_operator_is_rejected() {
    let mut shell = Shell::headless();
    assert!(matches!(
        shell.open_panel("Emboss"),
        Err(StudioError::UnknownOperator(_))
    ));
}

#[test]
fn second_open_of_same_panel_is_rejected_until_closed() {
    let mut shell = Shell::headless();
    let _input = load_gray(&mut shell, &gradient_image());

    let panel = shell.open_panel("Gaussian Blur").unwrap();
    assert!(matches!(
        shell.open_panel("Gaussian Blur"),
        Err(StudioError::PanelOpen(_))
    ));
    // A different panel coexists.
    let other = shell.open_panel("Thresholding").unwrap();
    assert_eq!(shell.open_panels().count(), 2);

    other.close(&mut shell);
    panel.close(&mut shell);
    assert_eq!(shell.open_panels().count(), 0);
    assert!(shell.open_panel("Gaussian Blur").is_ok());
}

#[test]
fn even_kernel_size_normalizes_before_any_recompute() {
    let mut shell = Shell::headless();
    let _input = load_gray(&mut shell, &gradient_image());

    let mut panel = shell.open_panel("Gaussian Blur").unwrap();
    panel.set_live_preview(false);

    let now = Instant::now();
    let outcome = panel
        .control_changed(&mut shell, "kernel_size", RawValue::Int(4), now)
        .unwrap();

    // Preview disabled: no recompute ran, yet the stored value is odd.
    assert_eq!(outcome, ChangeOutcome::LabelOnly);
    assert_eq!(panel.params().value("kernel_size"), Some(ParamValue::Int(3)));
    assert_eq!(panel.params().format("kernel_size").unwrap(), "3");
}

#[test]
fn undeclared_control_is_rejected() {
    let mut shell = Shell::headless();
    let _input = load_gray(&mut shell, &gradient_image());

    let mut panel = shell.open_panel("Gaussian Blur").unwrap();
    let result = panel.control_changed(&mut shell, "block_size", RawValue::Int(5), Instant::now());
    assert!(matches!(result, Err(StudioError::UnknownControl { .. })));
    panel.close(&mut shell);
}

#[test]
fn preview_never_mutates_current_output() {
    let (mut shell, recorder) = recording_shell();
    let img = gradient_image();
    let _input = load_gray(&mut shell, &img);

    let before = shell.state().output().cloned().unwrap();
    let mut panel = shell.open_panel("Thresholding").unwrap();

    let base = Instant::now();
    for i in 0..5u64 {
        // Spaced past the throttle so every change really previews.
        let now = base + Duration::from_millis(100 * (i + 1));
        let outcome = panel
            .control_changed(&mut shell, "thresh", RawValue::Int(40 * i as i64), now)
            .unwrap();
        assert_eq!(outcome, ChangeOutcome::Previewed);
    }

    assert!(recorder.count() > 1, "previews should have been presented");
    assert_eq!(shell.state().output().unwrap(), &before);

    panel.cancel(&mut shell);
    assert_eq!(shell.state().output().unwrap(), &before);
}

#[test]
fn revert_restores_exact_revert_target_pixels() {
    let (mut shell, recorder) = recording_shell();
    let img = gradient_image();
    let _input = load_gray(&mut shell, &img);

    let mut panel = shell.open_panel("Thresholding").unwrap();
    let target = panel.revert_target().clone();

    let base = Instant::now();
    for (i, raw) in [200, 30, 90, 250].into_iter().enumerate() {
        panel
            .control_changed(
                &mut shell,
                "thresh",
                RawValue::Int(raw),
                base + Duration::from_millis(100 * (i as u64 + 1)),
            )
            .unwrap();
    }

    panel.revert(&mut shell);

    // Pixel-identical restoration, regardless of the preview churn.
    assert_eq!(recorder.last().unwrap(), target);
    assert_eq!(panel.params().value("thresh"), Some(ParamValue::Int(127)));

    // Control positions re-sync to the defaults.
    let positions = panel.control_positions();
    let thresh = positions.iter().find(|(id, _)| *id == "thresh").unwrap();
    assert_eq!(thresh.1, RawValue::Int(127));

    panel.close(&mut shell);
}

#[test]
fn changes_inside_throttle_window_update_labels_only() {
    let (mut shell, recorder) = recording_shell();
    let _input = load_gray(&mut shell, &gradient_image());

    let mut panel = shell.open_panel("Thresholding").unwrap();
    let presented_before = recorder.count();

    let base = Instant::now();
    let first = panel
        .control_changed(&mut shell, "thresh", RawValue::Int(10), base)
        .unwrap();
    assert_eq!(first, ChangeOutcome::Previewed);

    // 20 ms later: inside the ~66 ms window, recompute dropped.
    let second = panel
        .control_changed(
            &mut shell,
            "thresh",
            RawValue::Int(20),
            base + Duration::from_millis(20),
        )
        .unwrap();
    assert_eq!(second, ChangeOutcome::LabelOnly);
    assert_eq!(recorder.count(), presented_before + 1);

    // The dropped event still updated the stored value and its label.
    assert_eq!(panel.params().value("thresh"), Some(ParamValue::Int(20)));
    assert_eq!(panel.params().format("thresh").unwrap(), "20");

    panel.close(&mut shell);
}

#[test]
fn commit_uses_final_parameters_even_when_throttled() {
    let (mut shell, _recorder) = recording_shell();
    let img = gradient_image();
    let _input = load_gray(&mut shell, &img);

    let mut panel = shell.open_panel("Thresholding").unwrap();

    let base = Instant::now();
    panel
        .control_changed(&mut shell, "thresh", RawValue::Int(200), base)
        .unwrap();
    // Immediately adjust again; the preview for this value is dropped.
    let outcome = panel
        .control_changed(
            &mut shell,
            "thresh",
            RawValue::Int(64),
            base + Duration::from_millis(5),
        )
        .unwrap();
    assert_eq!(outcome, ChangeOutcome::LabelOnly);

    panel.commit(&mut shell).unwrap();

    // No stale frame: the committed output reflects thresh = 64.
    let expected = cvlab_imgproc::threshold(&img, 64, 255, ThresholdType::Binary);
    assert_eq!(
        shell.state().output().unwrap().to_gray().as_raw(),
        expected.as_raw()
    );
    assert_eq!(shell.open_panels().count(), 0);
}

#[test]
fn threshold_scenario_solid_gray() {
    let mut shell = Shell::headless();
    let mut img = GrayImage::new(100, 100);
    img.as_mut().fill(128);
    let _input = load_gray(&mut shell, &img);

    // Defaults are method=Binary, threshold=127, maxval=255.
    let panel = shell.open_panel("Thresholding").unwrap();
    panel.commit(&mut shell).unwrap();

    let out = shell.state().output().unwrap().to_gray();
    assert!(out.as_raw().iter().all(|&v| v == 255));
}

#[test]
fn live_preview_toggle_suppresses_recomputes() {
    let (mut shell, recorder) = recording_shell();
    let _input = load_gray(&mut shell, &gradient_image());

    let mut panel = shell.open_panel("Brightness / Contrast").unwrap();
    panel.set_live_preview(false);
    let presented = recorder.count();

    let base = Instant::now();
    for i in 0..3u64 {
        let outcome = panel
            .control_changed(
                &mut shell,
                "brightness",
                RawValue::Int(i as i64 * 30),
                base + Duration::from_millis(100 * (i + 1)),
            )
            .unwrap();
        assert_eq!(outcome, ChangeOutcome::LabelOnly);
    }
    assert_eq!(recorder.count(), presented);

    panel.close(&mut shell);
}

#[test]
fn save_image_remembers_and_reuses_path() {
    let mut shell = Shell::headless();
    assert!(matches!(
        shell.save_image(None),
        Err(StudioError::NoSavePath)
    ));

    let _input = load_gray(&mut shell, &gradient_image());

    let dir = tempdir().unwrap();
    let save_path = dir.path().join("out.png");
    let written = shell.save_image(Some(&save_path)).unwrap();
    assert_eq!(written, save_path);
    assert!(save_path.exists());

    // A later plain save reuses the remembered path.
    let rewritten = shell.save_image(None).unwrap();
    assert_eq!(rewritten, save_path);
}

#[test]
fn load_failure_is_a_decode_error_and_state_survives() {
    let mut shell = Shell::headless();
    let result = shell.load_image(std::path::Path::new("/nonexistent/image.png"));
    assert!(matches!(result, Err(StudioError::Decode { .. })));
    assert!(shell.state().base().is_none());
}

fn camera_frames_dir(count: usize) -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    for i in 0..count {
        let mut img = GrayImage::new(20, 10);
        img.as_mut().fill((50 + i * 50) as u8);
        img.save(dir.path().join(format!("f_{i:03}.png"))).unwrap();
    }
    dir
}

#[test]
fn camera_tick_pulls_at_most_one_frame_per_interval() {
    let (mut shell, _recorder) = recording_shell();
    let dir = camera_frames_dir(3);

    shell
        .switch_camera(Box::new(PngSequenceSource::new(dir.path())))
        .unwrap();
    assert!(shell.camera_running());

    let base = Instant::now();
    shell.tick(base).unwrap();
    let first = shell.state().output().cloned().expect("first frame shown");
    assert_eq!(first.to_gray().get_pixel(0, 0)[0], 50);

    // 10 ms later: inside the ~30 ms pull window, nothing new.
    shell.tick(base + Duration::from_millis(10)).unwrap();
    assert_eq!(shell.state().output().unwrap(), &first);

    shell.tick(base + Duration::from_millis(35)).unwrap();
    assert_eq!(shell.state().output().unwrap().to_gray().get_pixel(0, 0)[0], 100);

    shell.stop_camera();
    assert!(!shell.camera_running());
}

#[test]
fn panel_opened_during_streaming_snapshots_latest_frame() {
    let mut shell = Shell::headless();
    let dir = camera_frames_dir(2);

    shell
        .switch_camera(Box::new(PngSequenceSource::new(dir.path())))
        .unwrap();
    shell.tick(Instant::now()).unwrap();

    // No file was ever loaded; the camera frame feeds the panel.
    let panel = shell.open_panel("Canny Edge Detection").unwrap();
    assert_eq!(panel.revert_target().to_gray().get_pixel(0, 0)[0], 50);
    panel.close(&mut shell);
}

#[test]
fn failed_camera_switch_leaves_no_camera_active() {
    let mut shell = Shell::headless();
    let empty = tempdir().unwrap();

    let result = shell.switch_camera(Box::new(PngSequenceSource::new(empty.path())));
    assert!(result.is_err());
    assert!(!shell.camera_running());
}

#[test]
fn switching_cameras_stops_the_previous_session() {
    let mut shell = Shell::headless();
    let first = camera_frames_dir(1);
    let second = camera_frames_dir(1);

    shell
        .switch_camera(Box::new(PngSequenceSource::new(first.path())))
        .unwrap();
    shell
        .switch_camera(Box::new(PngSequenceSource::new(second.path())))
        .unwrap();
    assert!(shell.camera_running());

    // Switching onto a bad source tears down the previous one too.
    let empty = tempdir().unwrap();
    let result = shell.switch_camera(Box::new(PngSequenceSource::new(empty.path())));
    assert!(result.is_err());
    assert!(!shell.camera_running());
}

#[test]
fn probe_without_depth_source_is_silent() {
    let mut shell = Shell::headless();
    assert!(shell.probe_depth(3, 4).is_none());

    let dir = camera_frames_dir(1);
    shell
        .switch_camera(Box::new(PngSequenceSource::new(dir.path())))
        .unwrap();
    shell.tick(Instant::now()).unwrap();
    // A plain webcam has no depth probe.
    assert!(shell.probe_depth(3, 4).is_none());
}

/// Always-ready mono source for the stereo probe test.
#[derive(Debug)]
struct StaticSource {
    frame: GrayImage,
    running: bool,
}

impl FrameSource for StaticSource {
    fn start(&mut self) -> cvlab_videoio::Result<()> {
        if self.running {
            return Err(VideoError::AlreadyRunning);
        }
        self.running = true;
        Ok(())
    }

    fn poll_frame(&mut self) -> cvlab_videoio::Result<Option<Picture>> {
        Ok(self.running.then(|| Picture::Gray(self.frame.clone())))
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[test]
fn depth_probe_formats_a_transient_message() {
    use cvlab_videoio::{StereoConfig, StereoDepthSource, StereoGeometry};

    let textured = |shift: i32| {
        let mut img = GrayImage::new(48, 32);
        for y in 0..32 {
            for x in 0..48 {
                let v = (((x as i32 + shift) * 37 + y as i32 * 17) % 251) as u8;
                img.put_pixel(x, y, Luma([v]));
            }
        }
        img
    };

    let rig = StereoDepthSource::new(
        Box::new(StaticSource {
            frame: textured(0),
            running: false,
        }),
        Box::new(StaticSource {
            frame: textured(4),
            running: false,
        }),
        StereoConfig::default(),
        StereoGeometry {
            focal_px: 100.0,
            baseline_m: 0.1,
        },
    );

    let mut shell = Shell::headless();
    shell.switch_camera(Box::new(rig)).unwrap();
    shell.tick(Instant::now()).unwrap();

    let message = shell.probe_depth(24, 16).expect("depth reading");
    assert!(message.starts_with("Depth at (24, 16):"));
    assert!(message.ends_with("meters"));
}
