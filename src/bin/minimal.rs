// Minimal smoke run of the core pipeline without any files or ffmpeg

use clip_compositor::{
    composition::{composite, TransitionKind, TransitionSpec},
    effects::{ColorGrading, Effect},
    video::{Clip, Frame},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎬 Testing Clip-Compositor Core Functionality");

    // Test 1: Synthetic clips of different sizes and rates
    println!("\n1. Building synthetic clips...");
    let red = Clip::solid([220, 40, 40], (320, 180), 2.0, 30.0)?;
    let blue = Clip::solid([40, 40, 220], (240, 240), 2.0, 24.0)?;
    println!("   {:?}", red);
    println!("   {:?}", blue);

    // Test 2: Every transition kind
    println!("\n2. Compositing every transition...");
    for kind in TransitionKind::ALL {
        let timeline = composite(&[red.clone(), blue.clone()], &TransitionSpec::new(kind, 0.5))?;
        println!(
            "   {:<12} {:.2}s {}x{}",
            kind.as_str(),
            timeline.duration(),
            timeline.width(),
            timeline.height()
        );
    }

    // Test 3: Grading and effects on a crossfade
    println!("\n3. Grading a crossfade...");
    let timeline = composite(
        &[red, blue],
        &TransitionSpec::new(TransitionKind::Crossfade, 1.0),
    )?;
    let graded = ColorGrading {
        contrast: 0.2,
        saturation: -0.3,
        ..ColorGrading::default()
    }
    .apply(&timeline)?;
    let finished = Effect::Vignette { intensity: 0.8 }.apply(&graded)?;

    // Test 4: Save a few frames
    println!("\n4. Saving frames...");
    let frames: Vec<Frame> = finished.to_frames(Some(2.0), 0.0, None)?;
    for (i, frame) in frames.iter().enumerate() {
        let path = format!("minimal_frame_{:02}.png", i);
        match frame.save_png(&path) {
            Ok(()) => println!("   📁 {}", path),
            Err(e) => println!("   ⚠️  Could not save {}: {}", path, e),
        }
    }

    println!("\n🎉 All steps passed! Clip-Compositor core is working.");
    Ok(())
}
