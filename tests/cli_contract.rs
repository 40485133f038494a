//! End-to-end CLI behavior through the compiled binary.

use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn run_glitchgif(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_glitchgif"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("glitchgif command should run")
}

fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn write_png(path: &Path, size: u32, phase: u8) {
    let mut img = image::RgbaImage::new(size, size);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = image::Rgba([(x * 8) as u8, (y * 8) as u8, phase, 255]);
    }
    img.save(path).expect("png should write");
}

#[test]
fn check_accepts_a_valid_params_file() {
    let dir = tempdir().expect("tempdir should create");
    let params_path = dir.path().join("params.yaml");
    std::fs::write(
        &params_path,
        r#"
glitch_intensity: 70
frame_delay_ms: 80.0
swap_probability: 0.12
"#,
    )
    .expect("params should write");

    let output = run_glitchgif(dir.path(), &["check", "params.yaml"]);
    assert!(output.status.success(), "check should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK: params.yaml"));
    assert!(stdout.contains("intensity 70"));
}

#[test]
fn check_rejects_unknown_fields() {
    let dir = tempdir().expect("tempdir should create");
    let params_path = dir.path().join("params.yaml");
    std::fs::write(&params_path, "glitch_intensityy: 70\n").expect("params should write");

    let output = run_glitchgif(dir.path(), &["check", "params.yaml"]);
    assert!(!output.status.success(), "typoed field should be rejected");
}

#[test]
fn check_rejects_out_of_range_probability() {
    let dir = tempdir().expect("tempdir should create");
    let params_path = dir.path().join("params.yaml");
    std::fs::write(&params_path, "swap_probability: 1.5\n").expect("params should write");

    let output = run_glitchgif(dir.path(), &["check", "params.yaml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("swap_probability"));
}

#[test]
fn render_fails_cleanly_on_a_missing_image() {
    let dir = tempdir().expect("tempdir should create");
    write_png(&dir.path().join("a.png"), 16, 0);

    let output = run_glitchgif(
        dir.path(),
        &["render", "a.png", "missing.png", "-o", "out.gif"],
    );
    assert!(!output.status.success());
    assert!(
        !dir.path().join("out.gif").exists(),
        "no partial output on failure"
    );
}

#[test]
fn render_produces_a_looping_gif() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not found on PATH");
        return;
    }

    let dir = tempdir().expect("tempdir should create");
    write_png(&dir.path().join("a.png"), 24, 40);
    write_png(&dir.path().join("b.png"), 24, 200);

    let output = run_glitchgif(
        dir.path(),
        &[
            "render",
            "a.png",
            "b.png",
            "-o",
            "out.gif",
            "--duration-ms",
            "500",
            "--seed",
            "7",
        ],
    );
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let gif = std::fs::read(dir.path().join("out.gif")).expect("gif should exist");
    assert!(gif.starts_with(b"GIF8"));
}
