use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::error::{RenderError, RenderResult};

/// Assembles an ordered image sequence into a video file.
///
/// On failure nothing may be left at `output`.
pub trait MovieEncoder {
    fn encode(&self, frames: &[PathBuf], frame_rate: f64, output: &Path) -> RenderResult<()>;
}

/// Decoded 8-bit RGBA image.
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub fn read_png_rgba(path: &Path) -> RenderResult<RgbaFrame> {
    let file = File::open(path).map_err(|e| RenderError::io(path, e))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let bad = |e: png::DecodingError| RenderError::SnapshotRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut reader = decoder.read_info().map_err(bad)?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(bad)?;
    buf.truncate(info.buffer_size());

    let pixels = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect(),
        png::ColorType::GrayscaleAlpha => buf.chunks_exact(2).flat_map(|c| [c[0], c[0], c[0], c[1]]).collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::Indexed => {
            return Err(RenderError::SnapshotRead {
                path: path.to_path_buf(),
                reason: "indexed png was not expanded".into(),
            })
        }
    };

    Ok(RgbaFrame {
        width: info.width,
        height: info.height,
        pixels,
    })
}

enum StreamFailure {
    Pipe(std::io::Error),
    Frame(RenderError),
}

/// Streams raw RGBA frames into an `ffmpeg` child process (H.264, yuv420p).
///
/// The video is written to a hidden sibling of the output path and renamed
/// into place once ffmpeg exited successfully.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    pub program: PathBuf,
    pub codec: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        FfmpegEncoder {
            program: PathBuf::from("ffmpeg"),
            codec: String::from("libx264"),
        }
    }
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        FfmpegEncoder {
            program: program.into(),
            ..Default::default()
        }
    }

    fn args(&self, width: u32, height: u32, frame_rate: f64, target: &Path, container: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s:v",
            &format!("{}x{}", width, height),
            "-r",
            &format!("{}", frame_rate),
            "-i",
            "-",
            "-c:v",
            &self.codec,
            "-pix_fmt",
            "yuv420p",
            // yuv420p needs even dimensions
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(container) = container {
            args.push("-f".into());
            args.push(container.into());
        }
        args.push("-y".into());
        args.push(target.to_string_lossy().into_owned());
        args
    }
}

impl MovieEncoder for FfmpegEncoder {
    fn encode(&self, frames: &[PathBuf], frame_rate: f64, output: &Path) -> RenderResult<()> {
        let encoding_error = |reason: String| RenderError::Encoding {
            output: output.to_path_buf(),
            reason,
        };

        let first_path = frames.first().ok_or_else(|| encoding_error("no frames to encode".into()))?;
        let first = read_png_rgba(first_path)?;
        let (width, height) = (first.width, first.height);

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = output
            .file_name()
            .ok_or_else(|| encoding_error("output path has no file name".into()))?
            .to_string_lossy()
            .into_owned();
        let extension = output.extension().map(|e| e.to_string_lossy().into_owned());

        let partial = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(&extension.as_ref().map(|e| format!(".{}", e)).unwrap_or_default())
            .tempfile_in(parent)
            .map_err(|e| RenderError::io(parent, e))?;

        let mut stderr_log = tempfile::tempfile().map_err(|e| RenderError::io(std::env::temp_dir(), e))?;
        let stderr_for_child = stderr_log.try_clone().map_err(|e| RenderError::io(std::env::temp_dir(), e))?;

        let container = if extension.is_none() { Some("mp4") } else { None };
        let args = self.args(width, height, frame_rate, partial.path(), container);
        log::debug!("{:?} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_for_child))
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => encoding_error(format!("{:?} not found on PATH", self.program)),
                _ => encoding_error(format!("failed to start {:?}: {}", self.program, e)),
            })?;

        let write_result = (|| -> Result<(), StreamFailure> {
            let stdin = child.stdin.as_mut().ok_or_else(|| {
                StreamFailure::Pipe(std::io::Error::new(ErrorKind::BrokenPipe, "stdin unavailable"))
            })?;
            stdin.write_all(&first.pixels).map_err(StreamFailure::Pipe)?;
            for path in &frames[1..] {
                let frame = read_png_rgba(path).map_err(StreamFailure::Frame)?;
                if (frame.width, frame.height) != (width, height) {
                    return Err(StreamFailure::Frame(encoding_error(format!(
                        "frame {:?} is {}x{}, expected {}x{}",
                        path, frame.width, frame.height, width, height
                    ))));
                }
                stdin.write_all(&frame.pixels).map_err(StreamFailure::Pipe)?;
            }
            stdin.flush().map_err(StreamFailure::Pipe)
        })();

        // closing stdin signals end of stream
        drop(child.stdin.take());
        if let Err(StreamFailure::Frame(_)) = write_result {
            child.kill().ok();
        }
        let status = child
            .wait()
            .map_err(|e| encoding_error(format!("waiting for ffmpeg failed: {}", e)))?;

        match write_result {
            Err(StreamFailure::Frame(e)) => return Err(e),
            // a broken pipe means ffmpeg died, its exit status explains why
            Err(StreamFailure::Pipe(e)) if status.success() => {
                return Err(encoding_error(format!("failed to write pixels: {}", e)))
            }
            _ => {}
        }
        if !status.success() {
            let mut log = String::new();
            stderr_log.seek(SeekFrom::Start(0)).ok();
            stderr_log.read_to_string(&mut log).ok();
            return Err(encoding_error(format!("ffmpeg exited with {}: {}", status, log.trim())));
        }

        partial
            .persist(output)
            .map_err(|e| RenderError::io(output, e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
        let file = File::create(path).unwrap();
        let mut encoder = png::Encoder::new(file, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let data: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
        writer.write_image_data(&data).unwrap();
    }

    #[test]
    fn rgb_png_is_expanded_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.png");
        write_png(&path, 3, 2, [10, 20, 30]);

        let frame = read_png_rgba(&path).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.pixels.len(), 3 * 2 * 4);
        assert_eq!(&frame.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn args_pick_container_for_extensionless_output() {
        let encoder = FfmpegEncoder::default();
        let args = encoder.args(640, 480, 12.5, Path::new("/tmp/movie"), Some("mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-s:v 640x480"));
        assert!(joined.contains("-r 12.5"));
        assert!(joined.ends_with("-f mp4 -y /tmp/movie"));
    }

    #[test]
    fn missing_program_is_an_encoding_error_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame_1.png");
        write_png(&frame, 4, 4, [0, 0, 255]);
        let output = dir.path().join("movie.mp4");

        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg-binary");
        let result = encoder.encode(&[frame.clone()], 10., &output);

        assert!(matches!(result, Err(RenderError::Encoding { .. })));
        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(left, vec![frame]);
    }

    fn ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn encodes_with_system_ffmpeg() {
        if !ffmpeg_available() {
            eprintln!("ffmpeg not on PATH, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = dir.path().join(format!("frame_{}.png", i));
                write_png(&p, 17, 9, [i * 80, 0, 0]);
                p
            })
            .collect();
        let output = dir.path().join("movie.mp4");

        FfmpegEncoder::default().encode(&frames, 10., &output).unwrap();
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }
}
