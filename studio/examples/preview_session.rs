//! Headless tour of the editing protocol: load an image, sweep a parameter
//! with live preview, commit, save. Run with RUST_LOG=debug for the event
//! stream.

use std::time::{Duration, Instant};

use cvlab_studio::{RawValue, Shell};
use image::{GrayImage, Luma};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let workdir = tempfile::tempdir()?;
    let input = workdir.path().join("input.png");
    let output = workdir.path().join("edges.png");

    let mut img = GrayImage::new(256, 256);
    for y in 0..256 {
        for x in 0..256 {
            let v = if (x / 32 + y / 32) % 2 == 0 { 40 } else { 215 };
            img.put_pixel(x, y, Luma([v]));
        }
    }
    img.save(&input)?;

    let mut shell = Shell::headless();
    shell.load_image(&input)?;

    let mut panel = shell.open_panel("Canny Edge Detection")?;
    let base = Instant::now();

    // A user dragging the slider: most events land inside the throttle
    // window and only update the label.
    for (ms, value) in [(0u64, 40), (15, 60), (30, 80), (70, 100), (140, 120)] {
        let outcome = panel.control_changed(
            &mut shell,
            "threshold1",
            RawValue::Int(value),
            base + Duration::from_millis(ms),
        )?;
        println!(
            "threshold1 = {value:>3} -> {outcome:?} (label: {})",
            panel.params().format("threshold1").unwrap_or_default()
        );
    }

    panel.commit(&mut shell)?;
    let saved = shell.save_image(Some(&output))?;
    println!("committed result saved to {}", saved.display());

    Ok(())
}
