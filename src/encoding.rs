//! GIF transcode of a captured stream.
//!
//! One-shot, non-restartable transform: raw RGBA frames are streamed over
//! ffmpeg's stdin through a bounded channel while a named worker thread
//! owns the process, and the palette filter graph produces a looping GIF in
//! a temporary file that is read back and deleted on every exit path.
//! Progress is reported as a monotonic 0..1 fraction ending exactly at 1.0.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use crate::capture::CapturedStream;

/// Output frame rate after transcoding.
pub const GIF_FPS: u32 = 15;
/// Output width bound; height follows the aspect ratio.
pub const GIF_MAX_WIDTH: u32 = 800;
/// The full filter graph: bounded rate, bounded width, content-derived
/// palette, then palette-mapped re-encode.
pub const GIF_FILTER: &str =
    "fps=15,scale=800:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

/// Fraction of the progress range spent delivering frames; the remainder is
/// reported when the encoder has fully drained and the file is read back.
const DELIVERY_PROGRESS_WEIGHT: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfmpegMode {
    Auto,
    System,
    Sidecar,
}

trait GifEncoderBackend: Send {
    fn mode_label(&self) -> &'static str;
    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()>;
}

struct SystemFfmpegBackend {
    size: String,
    sample_rate: String,
    output_path: PathBuf,
}

#[cfg(feature = "sidecar_ffmpeg")]
struct SidecarFfmpegBackend {
    size: String,
    sample_rate: String,
    output_path: PathBuf,
}

/// Frame count the filter graph should emit for this stream, within one
/// frame of `floor(duration_s * GIF_FPS)`.
pub fn expected_gif_frame_count(stream: &CapturedStream) -> usize {
    ((stream.duration_ms / 1000.0) * GIF_FPS as f64).floor() as usize
}

/// Whether a system ffmpeg binary is reachable. Tests use this to skip
/// encode coverage on hosts without ffmpeg.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Encode a captured stream into looping GIF bytes with the default
/// backend selection.
pub fn encode_gif(stream: &CapturedStream, on_progress: &mut dyn FnMut(f64)) -> Result<Vec<u8>> {
    encode_gif_with_mode(stream, FfmpegMode::Auto, on_progress)
}

/// Encode a captured stream into looping GIF bytes.
///
/// Fails before spawning anything if the stream is empty or malformed. On
/// encoder failure the partial output is discarded with the temp file; the
/// caller only ever sees complete GIF bytes or an error.
pub fn encode_gif_with_mode(
    stream: &CapturedStream,
    mode: FfmpegMode,
    on_progress: &mut dyn FnMut(f64),
) -> Result<Vec<u8>> {
    validate_stream(stream)?;

    let output = tempfile::Builder::new()
        .prefix("glitchgif-")
        .suffix(".gif")
        .tempfile()
        .context("failed to create temporary gif output")?;

    let size = format!("{}x{}", stream.width, stream.height);
    let sample_rate = stream.sample_rate.to_string();
    let backend = select_backend(mode, size, sample_rate, output.path().to_path_buf())?;
    let worker_name = format!("glitchgif-encoder-{}", backend.mode_label());

    let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(4);
    let worker = thread::Builder::new()
        .name(worker_name)
        .spawn(move || backend.run(receiver))
        .context("failed to spawn ffmpeg writer thread")?;

    let total = stream.frames.len();
    let mut reported = -1.0_f64;
    let mut report = |fraction: f64, on_progress: &mut dyn FnMut(f64)| {
        if fraction > reported {
            reported = fraction;
            on_progress(fraction);
        }
    };

    report(0.0, on_progress);
    let mut delivery_failed = false;
    for (index, frame) in stream.frames.iter().enumerate() {
        if sender.send(frame.clone()).is_err() {
            // Worker died early; fall through to join for the real error.
            delivery_failed = true;
            break;
        }
        let fraction = (index + 1) as f64 / total as f64 * DELIVERY_PROGRESS_WEIGHT;
        report(fraction, on_progress);
    }
    drop(sender);

    let worker_result = match worker.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("ffmpeg worker thread panicked")),
    };
    // The temp file (and any partial output) is removed when `output`
    // drops, on this path and on every early return above.
    worker_result.context("gif encode failed")?;
    if delivery_failed {
        bail!("ffmpeg stopped accepting frames before the stream ended");
    }

    let mut bytes = Vec::new();
    std::fs::File::open(output.path())
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .context("failed to read encoded gif")?;
    if bytes.is_empty() {
        bail!("ffmpeg produced an empty gif");
    }

    debug!("encoded {} frames into {} gif bytes", total, bytes.len());
    report(1.0, on_progress);
    Ok(bytes)
}

fn validate_stream(stream: &CapturedStream) -> Result<()> {
    if stream.frames.is_empty() {
        bail!("captured stream contains no frames");
    }
    if stream.width == 0 || stream.height == 0 {
        bail!(
            "captured stream has degenerate dimensions {}x{}",
            stream.width,
            stream.height
        );
    }
    let expected = stream.width as usize * stream.height as usize * 4;
    for (index, frame) in stream.frames.iter().enumerate() {
        if frame.len() != expected {
            bail!(
                "captured frame {index} has {} bytes, expected {expected}",
                frame.len()
            );
        }
    }
    Ok(())
}

fn select_backend(
    mode: FfmpegMode,
    size: String,
    sample_rate: String,
    output_path: PathBuf,
) -> Result<Box<dyn GifEncoderBackend>> {
    match mode {
        FfmpegMode::Auto | FfmpegMode::System => Ok(Box::new(SystemFfmpegBackend {
            size,
            sample_rate,
            output_path,
        })),
        FfmpegMode::Sidecar => {
            #[cfg(feature = "sidecar_ffmpeg")]
            {
                Ok(Box::new(SidecarFfmpegBackend {
                    size,
                    sample_rate,
                    output_path,
                }))
            }
            #[cfg(not(feature = "sidecar_ffmpeg"))]
            {
                Err(anyhow!(
                    "ffmpeg sidecar mode requested but the binary was built without `sidecar_ffmpeg`. Rebuild with `--features sidecar_ffmpeg`."
                ))
            }
        }
    }
}

impl GifEncoderBackend for SystemFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "system"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        run_ffmpeg_process(
            Path::new("ffmpeg"),
            receiver,
            &self.size,
            &self.sample_rate,
            &self.output_path,
            self.mode_label(),
        )
    }
}

#[cfg(feature = "sidecar_ffmpeg")]
impl GifEncoderBackend for SidecarFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "sidecar"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        let path = ffmpeg_sidecar::paths::ffmpeg_path();
        if !path.exists() {
            ffmpeg_sidecar::download::auto_download()
                .context("failed to auto-download ffmpeg sidecar binary")?;
        }
        run_ffmpeg_process(
            &path,
            receiver,
            &self.size,
            &self.sample_rate,
            &self.output_path,
            self.mode_label(),
        )
    }
}

fn run_ffmpeg_process(
    ffmpeg_path: &Path,
    receiver: mpsc::Receiver<Vec<u8>>,
    size: &str,
    sample_rate: &str,
    output_path: &Path,
    mode_label: &str,
) -> Result<()> {
    let args = ffmpeg_gif_args(size, sample_rate, output_path);
    let mut command = Command::new(ffmpeg_path);
    command
        .args(args.iter().map(String::as_str))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|error| {
        if error.kind() == ErrorKind::NotFound {
            anyhow!(
                "ffmpeg executable not found (mode={mode_label}, resolved_path={}). Install ffmpeg or build with `--features sidecar_ffmpeg`.",
                ffmpeg_path.display()
            )
        } else {
            anyhow!(
                "failed to spawn ffmpeg process (mode={mode_label}, resolved_path={}, args='{}'): {error}",
                ffmpeg_path.display(),
                args.join(" ")
            )
        }
    })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("failed to capture ffmpeg stdin"))?;
    let mut stderr_pipe = child.stderr.take();

    while let Ok(frame) = receiver.recv() {
        stdin
            .write_all(&frame)
            .context("failed to write frame to ffmpeg stdin")?;
    }

    stdin.flush().context("failed to flush ffmpeg stdin")?;
    drop(stdin);

    let status = child.wait().context("failed waiting for ffmpeg process")?;
    let stderr_tail = read_stderr_tail(&mut stderr_pipe)?;
    if !status.success() {
        return Err(anyhow!(
            "ffmpeg failed with status {status} (mode={mode_label}, resolved_path={}, args='{}', stderr_tail='{}')",
            ffmpeg_path.display(),
            args.join(" "),
            stderr_tail
        ));
    }

    Ok(())
}

/// rawvideo RGBA in over stdin, palette filter graph, looping GIF out.
pub fn ffmpeg_gif_args(size: &str, sample_rate: &str, output_path: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgba".to_owned(),
        "-s:v".to_owned(),
        size.to_owned(),
        "-r".to_owned(),
        sample_rate.to_owned(),
        "-i".to_owned(),
        "-".to_owned(),
        "-an".to_owned(),
        "-filter_complex".to_owned(),
        GIF_FILTER.to_owned(),
        "-loop".to_owned(),
        "0".to_owned(),
        "-f".to_owned(),
        "gif".to_owned(),
        output_path.to_string_lossy().into_owned(),
    ]
}

fn read_stderr_tail(stderr: &mut Option<std::process::ChildStderr>) -> Result<String> {
    let Some(mut pipe) = stderr.take() else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)
        .context("failed reading ffmpeg stderr")?;
    let text = String::from_utf8_lossy(&buf).to_string();
    Ok(last_n_chars(&text, 500))
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars().collect::<Vec<_>>();
    if chars.len() > max_chars {
        chars = chars[chars.len().saturating_sub(max_chars)..].to_vec();
    }
    chars.into_iter().collect::<String>().trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(frames: Vec<Vec<u8>>, width: u32, height: u32) -> CapturedStream {
        let count = frames.len();
        CapturedStream {
            width,
            height,
            sample_rate: 60,
            frames,
            duration_ms: count as f64 * 1000.0 / 60.0,
        }
    }

    #[test]
    fn empty_stream_is_rejected_before_spawn() {
        let empty = stream(Vec::new(), 4, 4);
        let mut progress = |_fraction: f64| {};
        let err = encode_gif(&empty, &mut progress).unwrap_err();
        assert!(err.to_string().contains("no frames"));
    }

    #[test]
    fn malformed_frame_is_rejected_before_spawn() {
        let bad = stream(vec![vec![0u8; 7]], 4, 4);
        let mut progress = |_fraction: f64| {};
        let err = encode_gif(&bad, &mut progress).unwrap_err();
        assert!(err.to_string().contains("expected 64"));
    }

    #[test]
    fn gif_args_carry_the_palette_filter_and_loop() {
        let args = ffmpeg_gif_args("320x240", "60", Path::new("/tmp/out.gif"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo"));
        assert!(joined.contains("-pix_fmt rgba"));
        assert!(joined.contains("-s:v 320x240"));
        assert!(joined.contains(GIF_FILTER));
        assert!(joined.contains("-loop 0"));
        assert!(joined.ends_with("/tmp/out.gif"));
    }

    #[test]
    fn expected_frame_count_follows_target_fps() {
        let s = stream(vec![vec![0u8; 64]; 180], 4, 4);
        // 180 samples at 60/s span 3s; the 15 fps graph keeps 45 frames.
        assert_eq!(expected_gif_frame_count(&s), 45);
    }
}
