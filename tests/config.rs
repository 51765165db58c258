use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use trash_detect::camera::PixelFormat;
use trash_detect::config::TrashDetectConfig;
use trash_detect::display::DisplayMode;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TRASH_DETECT_CONFIG",
        "TRASH_DETECT_MODEL",
        "TRASH_DETECT_LABELS",
        "TRASH_DETECT_CAMERA",
        "TRASH_DETECT_DISPLAY",
        "TRASH_DETECT_FONT",
        "TRASH_DETECT_SCRATCH_DIR",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "model": {
                "path": "models/yard.onnx",
                "input_size": 320,
                "confidence_threshold": 0.4
            },
            "camera": {
                "device": "/dev/video2",
                "width": 1280,
                "height": 720,
                "pixel_format": "bgr24",
                "warmup_ms": 250
            },
            "display": {
                "window_name": "Yard",
                "key_wait_ms": 10,
                "quit_key": "x"
            },
            "render": {
                "color": [0, 255, 0],
                "thickness": 3
            }
        }"#,
    );

    std::env::set_var("TRASH_DETECT_CONFIG", file.path());
    std::env::set_var("TRASH_DETECT_CAMERA", "stub://yard");
    std::env::set_var("TRASH_DETECT_DISPLAY", "headless");
    std::env::set_var("TRASH_DETECT_SCRATCH_DIR", "/var/tmp/trash");

    let cfg = TrashDetectConfig::load().expect("load config");

    assert_eq!(cfg.model.path, "models/yard.onnx");
    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(cfg.model.confidence_threshold, 0.4);
    assert_eq!(cfg.model.iou_threshold, 0.45);
    assert_eq!(cfg.camera.device, "stub://yard");
    assert_eq!(cfg.camera.width, 1280);
    assert_eq!(cfg.camera.height, 720);
    assert_eq!(cfg.camera.pixel_format, PixelFormat::Bgr24);
    assert_eq!(cfg.camera.warmup, Duration::from_millis(250));
    assert_eq!(cfg.display.mode, DisplayMode::Headless);
    assert_eq!(cfg.display.window_name, "Yard");
    assert_eq!(cfg.display.key_wait, Duration::from_millis(10));
    assert_eq!(cfg.display.quit_key, 'x');
    assert_eq!(cfg.render.style.color, [0, 255, 0]);
    assert_eq!(cfg.render.style.thickness, 3);
    assert_eq!(cfg.render.style.label_offset, 10);
    assert_eq!(cfg.scratch_dir, Some(PathBuf::from("/var/tmp/trash")));

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = TrashDetectConfig::load().expect("load defaults");
    assert_eq!(cfg.model.path, "trash_model.onnx");
    assert_eq!(cfg.camera.device, "/dev/video0");
    assert_eq!(cfg.display.mode, DisplayMode::Auto);
    assert_eq!(cfg.scratch_dir, None);

    clear_env();
}

#[test]
fn invalid_values_fail_to_load() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "model": { "iou_threshold": 2.0 } }"#);
    std::env::set_var("TRASH_DETECT_CONFIG", file.path());
    assert!(TrashDetectConfig::load().is_err());

    clear_env();
    std::env::set_var("TRASH_DETECT_DISPLAY", "fullscreen");
    assert!(TrashDetectConfig::load().is_err());

    clear_env();
}

#[test]
fn malformed_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("{ not json");
    std::env::set_var("TRASH_DETECT_CONFIG", file.path());
    let err = TrashDetectConfig::load().expect_err("malformed json");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
