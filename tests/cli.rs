use std::{fs, process::Command};

fn run(frames: &str, with_video: bool) -> (std::process::Output, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    let video = dir.path().join("clip.mp4");
    if with_video {
        fs::write(&video, b"placeholder").unwrap();
    }

    let output = Command::new(env!("CARGO_BIN_EXE_vidlottie"))
        .arg("--frames")
        .arg(frames)
        .arg("--input")
        .arg(&video)
        .arg("--output-dir")
        .arg(&out_dir)
        .output()
        .unwrap();

    (output, dir)
}

fn out_dir_is_untouched(dir: &tempfile::TempDir) -> bool {
    fs::read_dir(dir.path().join("out")).unwrap().next().is_none()
}

#[test]
fn zero_frames_is_rejected() {
    let (output, dir) = run("0", true);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Invalid input"));
    assert!(out_dir_is_untouched(&dir));
}

#[test]
fn negative_and_non_integer_frames_are_rejected() {
    for frames in ["-4", "forty"] {
        let (output, dir) = run(frames, true);

        assert!(!output.status.success(), "{}", frames);
        assert!(out_dir_is_untouched(&dir));
    }
}

#[test]
fn missing_video_is_rejected() {
    let (output, dir) = run("10", false);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("MP4 file was not found"), "{}", stdout);
    assert!(out_dir_is_untouched(&dir));
}

#[test]
fn unreadable_video_is_reported() {
    let (output, dir) = run("5", true);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.starts_with("error opening the video file"), "{}", stdout);
    assert!(out_dir_is_untouched(&dir));
}
