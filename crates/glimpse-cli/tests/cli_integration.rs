//! Integration tests for the glimpse binary.
//!
//! Every test runs against its own temporary home directory with a short
//! story duration so viewer sessions finish quickly.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const HOUR_MS: u64 = 60 * 60 * 1000;

fn home() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "story_duration_ms = 40\nframe_interval_ms = 10\n",
    )
    .unwrap();
    dir
}

fn glimpse(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_glimpse"));
    cmd.env("GLIMPSE_HOME", home).env_remove("RUST_LOG");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    glimpse(home)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run glimpse")
}

fn run_with_stdin(home: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = glimpse(home)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn glimpse");
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().expect("failed to read output")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    let path = dir.join(name);
    fs::write(&path, buf.into_inner()).unwrap();
    path
}

fn persisted(home: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(home.join("store").join("stories.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap()
}

// =============================================================================
// Basics
// =============================================================================

#[test]
fn integration_help_flag() {
    let home = home();
    let output = run(home.path(), &["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("glimpse"));
    assert!(out.contains("Usage"));
}

#[test]
fn integration_list_empty_feed() {
    let home = home();
    let output = run(home.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No stories yet"));
}

#[test]
fn integration_invalid_config_is_rejected() {
    let home = home();
    fs::write(home.path().join("config.toml"), "story_duration_ms = 0\n").unwrap();
    let output = run(home.path(), &["list"]);
    assert!(!output.status.success());
}

#[test]
fn integration_unusable_storage_key_is_rejected() {
    let home = home();
    fs::write(home.path().join("config.toml"), "storage_key = \"my.stories\"\n").unwrap();
    let path = write_png(home.path(), "a.png", 4, 4);

    let output = run(home.path(), &["add", path.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(!stdout(&output).contains("Added story"));
    assert!(stderr(&output).contains("storage_key"));
}

// =============================================================================
// Uploads
// =============================================================================

#[test]
fn integration_add_image_appends_story() {
    let home = home();
    let first = write_png(home.path(), "a.png", 8, 8);
    let second = write_png(home.path(), "b.png", 8, 8);

    assert!(run(home.path(), &["add", first.to_str().unwrap()]).status.success());
    let output = run(home.path(), &["add", second.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Added story"));

    let output = run(home.path(), &["list", "--json"]);
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["viewed"], false);
    assert!(
        listed[1]["imageRef"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
    assert!(listed[0]["timestamp"].as_u64() <= listed[1]["timestamp"].as_u64());
}

#[test]
fn integration_add_non_image_is_a_notice() {
    let home = home();
    let path = home.path().join("notes.txt");
    fs::write(&path, "not an image").unwrap();

    let output = run(home.path(), &["add", path.to_str().unwrap()]);

    assert!(output.status.success(), "upload failures are not fatal");
    assert!(stderr(&output).contains("Please select an image file"));
    assert!(stdout(&run(home.path(), &["list"])).contains("No stories yet"));
}

#[test]
fn integration_add_missing_file_is_a_notice() {
    let home = home();
    let output = run(home.path(), &["add", "/no/such/file.png"]);
    assert!(output.status.success());
    assert!(stderr(&output).contains("Error reading the file"));
}

// =============================================================================
// Viewer
// =============================================================================

#[test]
fn integration_view_plays_to_end_when_stdin_closed() {
    let home = home();
    for name in ["a.png", "b.png", "c.png"] {
        let path = write_png(home.path(), name, 4, 4);
        assert!(run(home.path(), &["add", path.to_str().unwrap()]).status.success());
    }

    let output = run(home.path(), &["view", "0"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("[1/3]"));
    assert!(out.contains("[3/3]"));
    assert!(out.contains("[viewer end of stories]"));
    let stories = persisted(home.path());
    assert!(
        stories
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["viewed"] == true)
    );
}

#[test]
fn integration_view_escape_marks_only_opened_story() {
    let home = home();
    fs::write(
        home.path().join("config.toml"),
        "story_duration_ms = 60000\nframe_interval_ms = 10\n",
    )
    .unwrap();
    for name in ["a.png", "b.png"] {
        let path = write_png(home.path(), name, 4, 4);
        assert!(run(home.path(), &["add", path.to_str().unwrap()]).status.success());
    }

    let output = run_with_stdin(home.path(), &["view", "1"], "q\n");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("[viewer closed]"));
    let stories = persisted(home.path());
    assert_eq!(stories[0]["viewed"], false);
    assert_eq!(stories[1]["viewed"], true);
}

#[test]
fn integration_view_out_of_range_fails() {
    let home = home();
    let output = run(home.path(), &["view", "3"]);
    assert!(!output.status.success());
}

// =============================================================================
// Expiry
// =============================================================================

#[test]
fn integration_sweep_removes_expired() {
    let home = home();
    let now = now_ms();
    let store = home.path().join("store");
    fs::create_dir_all(&store).unwrap();
    let stories = serde_json::json!([
        { "id": "old", "imageRef": "blob:old", "timestamp": now - 25 * HOUR_MS, "viewed": true },
        { "id": "new", "imageUrl": "blob:new", "timestamp": now - HOUR_MS, "viewed": false },
    ]);
    fs::write(store.join("stories.json"), stories.to_string()).unwrap();

    let listed = stdout(&run(home.path(), &["list"]));
    assert_eq!(listed.lines().count(), 1, "list skips expired stories");
    assert!(listed.contains("1 hour ago"));
    assert_eq!(persisted(home.path()).as_array().unwrap().len(), 2);

    let output = run(home.path(), &["sweep"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Removed 1 expired stories"));

    let remaining = persisted(home.path());
    let remaining = remaining.as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "new");
    assert_eq!(remaining[0]["imageRef"], "blob:new");
}

#[test]
fn integration_corrupt_store_reads_as_empty() {
    let home = home();
    let store = home.path().join("store");
    fs::create_dir_all(&store).unwrap();
    fs::write(store.join("stories.json"), "{ definitely not a list").unwrap();

    let output = run(home.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No stories yet"));
}

// =============================================================================
// Feed session
// =============================================================================

#[test]
fn integration_feed_session() {
    let home = home();
    let path = write_png(home.path(), "a.png", 4, 4);
    let script = format!("list\nadd {}\nopen 0\nq\nlist\nquit\n", path.display());

    let output = run_with_stdin(home.path(), &["feed"], &script);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("No stories yet"));
    assert!(out.contains("Added story"));
    assert!(out.contains("[1/1]"));
    assert_eq!(persisted(home.path())[0]["viewed"], true);
}
