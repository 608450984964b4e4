// src/video/ffmpeg.rs - Decode/encode through the external ffmpeg executables

use std::collections::HashSet;
use std::ffi::OsString;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::{ExportError, Result, SourceError};
use crate::video::encoder::{EncoderBackend, VideoCodec, VideoWriter, WriterSpec};
use crate::video::source::{SourceOpener, VideoSource};
use crate::video::types::{Frame, VideoMetadata};

/// Check whether an ffmpeg-family executable can be run
pub fn check_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Read stream metadata with ffprobe
pub fn probe(ffprobe: &Path, path: &Path) -> Result<VideoMetadata> {
    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-count_packets",
            "-show_entries", "stream=codec_name,width,height,r_frame_rate,nb_frames,nb_read_packets",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .map_err(|_| SourceError::OpenFailed {
            path: format!("{}: ffprobe failed to start", path.display()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("ffprobe failed for {}: {}", path.display(), stderr.trim());
        return Err(SourceError::OpenFailed {
            path: path.display().to_string(),
        }
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout).ok_or_else(|| {
        SourceError::OpenFailed {
            path: format!("{}: no decodable video stream", path.display()),
        }
        .into()
    })
}

/// Parse `key=value` lines from ffprobe's default writer
fn parse_probe_output(text: &str) -> Option<VideoMetadata> {
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    let mut nb_frames = None;
    let mut nb_packets = None;
    let mut codec = String::from("unknown");

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "codec_name" => codec = value.to_string(),
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => fps = parse_rational(value),
            "nb_frames" => nb_frames = value.parse::<usize>().ok(),
            "nb_read_packets" => nb_packets = value.parse::<usize>().ok(),
            _ => {}
        }
    }

    let frame_count = nb_frames.filter(|&n| n > 0).or(nb_packets)?;
    Some(VideoMetadata {
        frame_count,
        fps: fps.filter(|&f| f > 0.0)?,
        width: width.filter(|&w| w > 0)?,
        height: height.filter(|&h| h > 0)?,
        codec,
    })
}

/// Parse a frame rate like `30000/1001` or `25`
fn parse_rational(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => value.parse().ok(),
    }
}

struct DecoderProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
}

impl Drop for DecoderProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Video source decoding packed RGB frames from an ffmpeg child process
///
/// Seeking restarts the decoder with a `select` filter on the frame number, so
/// positioning is frame-accurate rather than keyframe-accurate.
pub struct FfmpegSource {
    path: PathBuf,
    ffmpeg: PathBuf,
    metadata: VideoMetadata,
    position: usize,
    decoder: Option<DecoderProcess>,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P, ffmpeg: &Path, ffprobe: &Path) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SourceError::OpenFailed {
                path: path.display().to_string(),
            }
            .into());
        }

        let metadata = probe(ffprobe, path)?;
        info!(
            "Opened {}: {} frames, {}x{} @ {:.2} fps ({})",
            path.display(),
            metadata.frame_count,
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.codec
        );

        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg: ffmpeg.to_path_buf(),
            metadata,
            position: 0,
            decoder: None,
        })
    }

    fn spawn_decoder(&self) -> Result<DecoderProcess> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-i"]).arg(&self.path);
        if self.position > 0 {
            cmd.args(["-vf", &format!("select=gte(n\\,{})", self.position), "-vsync", "0"]);
        }
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SourceError::Seek {
                index: self.position,
                reason: format!("failed to start ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SourceError::Seek {
            index: self.position,
            reason: "ffmpeg stdout unavailable".to_string(),
        })?;

        debug!("Started decoder for {} at frame {}", self.path.display(), self.position);
        let frame_size = Frame::byte_len(self.metadata.width, self.metadata.height);
        Ok(DecoderProcess {
            child,
            stdout: BufReader::with_capacity(frame_size * 2, stdout),
        })
    }
}

impl VideoSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index > self.metadata.frame_count {
            return Err(SourceError::Seek {
                index,
                reason: format!("video has {} frames", self.metadata.frame_count),
            }
            .into());
        }
        if index != self.position || self.decoder.is_none() {
            self.decoder = None;
            self.position = index;
        }
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.decoder.is_none() {
            self.decoder = Some(self.spawn_decoder()?);
        }
        let (width, height) = (self.metadata.width, self.metadata.height);
        let index = self.position;
        let decoder = match self.decoder.as_mut() {
            Some(decoder) => decoder,
            None => return Ok(None),
        };

        let mut buffer = vec![0u8; Frame::byte_len(width, height)];
        match decoder.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(SourceError::Decode {
                    index,
                    reason: e.to_string(),
                }
                .into())
            }
        }

        let frame = Frame::from_rgb_bytes(width, height, buffer).ok_or_else(|| SourceError::Decode {
            index,
            reason: "short frame buffer".to_string(),
        })?;
        self.position += 1;
        Ok(Some(frame))
    }

    fn position(&self) -> usize {
        self.position
    }
}

/// Opens files through [`FfmpegSource`]
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegOpener {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl SourceOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(FfmpegSource::open(path, &self.ffmpeg, &self.ffprobe)?))
    }
}

/// Encoder backend feeding raw RGB frames to an ffmpeg child process
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    encoders: Mutex<Option<HashSet<String>>>,
}

impl FfmpegEncoder {
    pub fn new<P: Into<PathBuf>>(ffmpeg: P) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            encoders: Mutex::new(None),
        }
    }

    /// Names from `ffmpeg -encoders`, cached after the first call
    fn encoder_names(&self) -> HashSet<String> {
        let mut cache = match self.encoders.lock() {
            Ok(cache) => cache,
            Err(_) => return HashSet::new(),
        };
        if let Some(names) = cache.as_ref() {
            return names.clone();
        }

        let names = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .map(|output| parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
            .unwrap_or_default();

        debug!("ffmpeg reports {} encoders", names.len());
        *cache = Some(names.clone());
        names
    }
}

/// Containers whose muxer stores whatever fourcc it is given
const FOURCC_CONTAINERS: &[&str] = &["avi"];

/// Command line for an rgb24-over-stdin encode of `spec`
///
/// The codec's fourcc is only forced for containers that accept arbitrary
/// tags; mp4 and mov pick their own.
fn writer_args(spec: &WriterSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push("-s".into());
    args.push(format!("{}x{}", spec.width, spec.height).into());
    args.push("-r".into());
    args.push(spec.fps.to_string().into());
    args.extend(["-i", "-", "-c:v", spec.codec.ffmpeg_encoder()].iter().map(OsString::from));

    let forces_tag = spec
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FOURCC_CONTAINERS.iter().any(|c| c.eq_ignore_ascii_case(ext)))
        .unwrap_or(false);
    if forces_tag {
        args.push("-vtag".into());
        args.push(spec.codec.fourcc().into());
    }

    // yuv420p needs even dimensions
    args.extend(
        ["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p"]
            .iter()
            .map(OsString::from),
    );
    args.push(spec.path.clone().into_os_string());
    args
}

/// Encoder names from `ffmpeg -encoders` output (` V..... libx264  description`)
fn parse_encoder_list(text: &str) -> HashSet<String> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            (flags.len() == 6 && flags.starts_with('V')).then(|| name.to_string())
        })
        .collect()
}

impl EncoderBackend for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self, codec: VideoCodec) -> bool {
        self.encoder_names().contains(codec.ffmpeg_encoder())
    }

    fn open(&self, spec: &WriterSpec) -> Result<Box<dyn VideoWriter>> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(writer_args(spec));

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExportError::Encode {
                reason: format!("Failed to spawn FFmpeg process: {}", e),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| ExportError::Encode {
            reason: "FFmpeg stdin unavailable".to_string(),
        })?;

        info!(
            "Encoding {} as {} ({}x{} @ {:.2} fps)",
            spec.path.display(),
            spec.codec,
            spec.width,
            spec.height,
            spec.fps
        );

        Ok(Box::new(FfmpegWriter {
            child: Some(child),
            stdin: Some(stdin),
            width: spec.width,
            height: spec.height,
            written: 0,
        }))
    }
}

struct FfmpegWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    written: usize,
}

impl VideoWriter for FfmpegWriter {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(ExportError::Encode {
                reason: format!(
                    "frame is {}x{}, stream expects {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| ExportError::Encode {
            reason: "stream already closed".to_string(),
        })?;
        stdin
            .write_all(frame.as_rgb_bytes())
            .map_err(|e| ExportError::Encode {
                reason: format!("FFmpeg stopped accepting frames: {}", e),
            })?;
        self.written += 1;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        // Closing stdin signals end of input
        drop(self.stdin.take());

        let child = match self.child.take() {
            Some(child) => child,
            None => return Ok(()),
        };
        let output = child.wait_with_output().map_err(|e| ExportError::Encode {
            reason: format!("FFmpeg execution failed: {}", e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Encode {
                reason: format!("FFmpeg failed: {}", stderr.trim()),
            }
            .into());
        }
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.written
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
