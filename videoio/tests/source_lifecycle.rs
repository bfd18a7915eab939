use cvlab_core::Picture;
use cvlab_videoio::{
    FrameSource, PngSequenceSource, StereoConfig, StereoDepthSource, StereoGeometry, VideoError,
};
use image::{GrayImage, Luma};
use tempfile::tempdir;

fn write_frames(dir: &std::path::Path, count: usize) {
    for i in 0..count {
        let mut img = GrayImage::new(16, 12);
        img.as_mut().fill((i * 10) as u8);
        img.save(dir.join(format!("frame_{i:06}.png"))).unwrap();
    }
}

#[test]
fn stop_before_start_is_a_no_op() {
    let dir = tempdir().unwrap();
    let mut source = PngSequenceSource::new(dir.path());

    source.stop();
    assert!(!source.is_running());
    assert!(matches!(source.poll_frame(), Ok(None)));
}

#[test]
fn double_start_is_rejected_and_stream_survives() {
    let dir = tempdir().unwrap();
    write_frames(dir.path(), 3);

    let mut source = PngSequenceSource::new(dir.path());
    source.start().unwrap();
    assert!(source.is_running());

    let second = source.start();
    assert!(matches!(second, Err(VideoError::AlreadyRunning)));

    // The original stream is intact: exactly one "handle", still serving.
    assert!(source.is_running());
    assert!(source.poll_frame().unwrap().is_some());
}

#[test]
fn start_on_empty_directory_fails_cleanly() {
    let dir = tempdir().unwrap();
    let mut source = PngSequenceSource::new(dir.path());

    assert!(source.start().is_err());
    // The failed start left the source idle, and it can be retried.
    assert!(!source.is_running());
    write_frames(dir.path(), 1);
    assert!(source.start().is_ok());
}

#[test]
fn frames_replay_in_order_then_run_dry() {
    let dir = tempdir().unwrap();
    write_frames(dir.path(), 3);

    let mut source = PngSequenceSource::new(dir.path());
    source.start().unwrap();
    assert_eq!(source.frame_count(), 3);

    for expected in [0u8, 10, 20] {
        let frame = source.poll_frame().unwrap().expect("frame available");
        let gray = frame.to_gray();
        assert_eq!(gray.dimensions(), (16, 12));
        assert_eq!(gray.get_pixel(0, 0)[0], expected);
    }

    assert!(source.poll_frame().unwrap().is_none());
}

#[test]
fn looping_source_wraps_around() {
    let dir = tempdir().unwrap();
    write_frames(dir.path(), 2);

    let mut source = PngSequenceSource::new(dir.path()).looping(true);
    source.start().unwrap();

    for _ in 0..5 {
        assert!(source.poll_frame().unwrap().is_some());
    }
}

/// Always-ready in-memory source used to drive the stereo rig.
#[derive(Debug)]
struct StaticSource {
    frame: GrayImage,
    running: bool,
    fail_start: bool,
}

impl StaticSource {
    fn new(frame: GrayImage) -> Self {
        Self {
            frame,
            running: false,
            fail_start: false,
        }
    }
}

impl FrameSource for StaticSource {
    fn start(&mut self) -> cvlab_videoio::Result<()> {
        if self.fail_start {
            return Err(VideoError::Backend("injected failure".into()));
        }
        if self.running {
            return Err(VideoError::AlreadyRunning);
        }
        self.running = true;
        Ok(())
    }

    fn poll_frame(&mut self) -> cvlab_videoio::Result<Option<Picture>> {
        if !self.running {
            return Ok(None);
        }
        Ok(Some(Picture::Gray(self.frame.clone())))
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

fn textured(width: u32, height: u32, shift: i32) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let sx = x as i32 + shift;
            let v = ((sx * 37 + y as i32 * 17) % 251).unsigned_abs() as u8;
            img.put_pixel(x, y, Luma([v]));
        }
    }
    img
}

#[test]
fn stereo_source_reports_probe_distance() {
    let shift = 4;
    let left = StaticSource::new(textured(48, 32, 0));
    let right = StaticSource::new(textured(48, 32, shift));

    let geometry = StereoGeometry {
        focal_px: 100.0,
        baseline_m: 0.1,
    };
    let mut rig = StereoDepthSource::new(
        Box::new(left),
        Box::new(right),
        StereoConfig::default(),
        geometry,
    );

    assert!(rig.depth_probe().is_none(), "no probe before first frame");
    assert!(rig.config().median_filter);

    rig.start().unwrap();
    let frame = rig.poll_frame().unwrap().expect("depth frame");
    assert_eq!(frame.dimensions(), (48, 32));

    let depth = rig.last_depth().expect("raw depth retained");
    assert_eq!((depth.width(), depth.height()), (48, 32));

    // depth = focal * baseline / disparity = 100 * 0.1 / 4 = 2.5 m
    let probe = rig.depth_probe().expect("probe after frame");
    let d = probe.distance_at(24, 16).expect("valid center sample");
    assert!((d - 2.5).abs() < 0.7, "distance {d} out of expected band");

    rig.stop();
    assert!(!rig.is_running());
}

#[test]
fn stereo_start_failure_unwinds_left_camera() {
    let left = StaticSource::new(textured(16, 16, 0));
    let mut right = StaticSource::new(textured(16, 16, 0));
    right.fail_start = true;

    let mut rig = StereoDepthSource::new(
        Box::new(left),
        Box::new(right),
        StereoConfig::default(),
        StereoGeometry::default(),
    );

    assert!(rig.start().is_err());
    // The attempt fully unwound: the rig is idle and polls yield nothing.
    assert!(!rig.is_running());
    assert!(matches!(rig.poll_frame(), Ok(None)));
}
