// Demo: cut, crop, resize and export a generated video without ffmpeg

use std::path::PathBuf;

use vidcut::{
    config::Config,
    edit::{CropRect, EditingSession},
    export::ExportProgress,
    logging,
    video::{DryRunEncoder, SyntheticSource, VideoSource},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    logging::init_logging(&config.logging, false);

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    let input = out_dir.join("synthetic.mp4");

    println!("🎬 vidcut synthetic export demo");

    let mut session = EditingSession::new(&config);
    let opener = |_: &std::path::Path| -> vidcut::Result<Box<dyn VideoSource>> {
        Ok(Box::new(SyntheticSource::new(100, 30.0, 320, 240)))
    };
    let metadata = session.load_video(&input, &opener)?.clone();
    println!(
        "   Source: {} frames, {}x{} @ {} fps",
        metadata.frame_count, metadata.width, metadata.height, metadata.fps
    );

    session.confirm_segment(20, 50)?;
    session.confirm_crop(CropRect::new(40, 30, 280, 210)?)?;
    session.confirm_resize(160, 120)?;
    println!("   Segment [20, 50), crop 240x180 -> resize 160x120");

    let encoder = DryRunEncoder::new();
    let mut report = |p: ExportProgress| {
        if p.frames_written % 10 == 0 {
            println!("   Saved frame {}/{}", p.frames_written, p.total_frames);
        }
    };

    let sequence = session.export(&"*.png".parse()?, &encoder, &mut report)?;
    println!("\n✅ Image sequence: {} files in {}", sequence.outputs.len(), out_dir.join("synthetic_frames").display());

    let video = session.export(&".mp4".parse()?, &encoder, &mut report)?;
    for record in encoder.records() {
        println!(
            "✅ Video (dry run): {} with {} frames at {:.1} fps, codec {}",
            record.spec.path.display(),
            record.frame_dims.len(),
            record.spec.fps,
            record.spec.codec
        );
    }
    println!("   Reported outputs: {:?}", video.outputs);

    Ok(())
}
