use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use argh::FromArgs;
use serde::Serialize;

use egomotion::image::Image;
use egomotion::overlay::{match_segments, Segment};
use egomotion::{Correspondence, FrameError, FrameTracker, TrackerConfig};

#[derive(FromArgs)]
/// Estimate the camera motion between consecutive frames of an image sequence
struct Args {
    /// directory with the frames, processed in file name order
    #[argh(option, short = 'f')]
    frames: PathBuf,

    /// JSON file receiving one record per frame
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct FrameRecord {
    frame: usize,
    path: PathBuf,
    timestamp: f64,
    matches: usize,
    segments: Vec<Segment>,
    rotation: Option<[[f64; 3]; 3]>,
    translation: Option<[f64; 3]>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)?,
        None => TrackerConfig::default(),
    };
    let mut tracker = FrameTracker::new(config)?;

    ctrlc::set_handler({
        let stop = tracker.stop_handle();
        move || {
            log::info!("Received Ctrl-C signal. Stopping after the current frame.");
            stop.stop();
        }
    })?;

    let frames = list_frames(&args.frames)?;
    log::info!("found {} frames in {}", frames.len(), args.frames.display());

    let mut records = Vec::with_capacity(frames.len());
    for (index, path) in frames.into_iter().enumerate() {
        let frame = read_frame(&path, tracker.image_size().width, tracker.image_size().height)?;

        let result = match tracker.process_frame(&frame) {
            Ok(result) => result,
            Err(FrameError::Stopped) => break,
            Err(err) => return Err(err.into()),
        };
        log::info!("{} matches", result.correspondences.len());

        let normalized: Vec<Correspondence> = result
            .correspondences
            .iter()
            .map(|c| c.normalized(tracker.camera()))
            .collect();

        records.push(FrameRecord {
            frame: index,
            path,
            timestamp: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs_f64(),
            matches: result.correspondences.len(),
            segments: match_segments(tracker.camera(), &normalized),
            rotation: result.pose.map(|p| p.rotation),
            translation: result.pose.map(|p| p.translation),
        });

        // rewritten every frame so a later failure keeps what was processed
        if let Some(output) = &args.output {
            write_records(output, &records)?;
        }
    }

    if let Some(output) = &args.output {
        log::info!("wrote {} records to {}", records.len(), output.display());
    }

    Ok(())
}

/// Replace the content of `path` with the records processed so far.
fn write_records(path: &Path, records: &[FrameRecord]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Image files of a directory, sorted by file name.
fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false);
        if is_image {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// Decode a frame and resize it to the tracker resolution.
fn read_frame(
    path: &Path,
    width: usize,
    height: usize,
) -> Result<Image<u8, 3>, Box<dyn std::error::Error>> {
    let rgb = image::open(path)?
        .resize_exact(
            width as u32,
            height as u32,
            image::imageops::FilterType::Triangle,
        )
        .to_rgb8();
    Ok(Image::new([width, height].into(), rgb.into_raw())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frame: usize) -> FrameRecord {
        FrameRecord {
            frame,
            path: PathBuf::from(format!("{frame:04}.png")),
            timestamp: 0.0,
            matches: 0,
            segments: Vec::new(),
            rotation: None,
            translation: None,
        }
    }

    #[test]
    fn test_write_records_replaces_previous_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("records.json");

        write_records(&path, &[record(0), record(1), record(2)])?;
        write_records(&path, &[record(0)])?;

        let value: serde_json::Value = serde_json::from_reader(File::open(&path)?)?;
        let frames = value.as_array().ok_or("expected an array")?;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["frame"], 0);
        assert_eq!(frames[0]["rotation"], serde_json::Value::Null);
        Ok(())
    }

    #[test]
    fn test_list_frames_sorted_images_only() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        for name in ["b.png", "a.JPG", "c.jpeg", "notes.txt"] {
            File::create(dir.path().join(name))?;
        }
        let frames = list_frames(dir.path())?;
        let names: Vec<_> = frames
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .collect();
        assert_eq!(names, ["a.JPG", "b.png", "c.jpeg"]);
        Ok(())
    }
}
