use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use textcam::camera::Size;
use textcam::config::TextcamConfig;
use textcam::Rotation;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TEXTCAM_CONFIG",
        "TEXTCAM_THROTTLE_MS",
        "TEXTCAM_RECOGNIZER",
        "TEXTCAM_RECOGNIZER_ENDPOINT",
        "TEXTCAM_RECOGNIZER_TIMEOUT_MS",
        "TEXTCAM_CAMERA_DEVICE",
        "TEXTCAM_CLEAR_AFTER_MS",
        "TEXTCAM_CONTENT_URL",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = TextcamConfig::load().expect("load config");

    assert_eq!(cfg.throttle_interval, Duration::from_millis(500));
    assert_eq!(cfg.normalize.jpeg_quality, 100);
    assert_eq!(cfg.normalize.rotation, Rotation::Cw90);
    assert_eq!(cfg.recognizer.backend, "scripted");
    assert_eq!(cfg.recognizer.endpoint, None);
    assert_eq!(cfg.recognizer.timeout, Duration::from_secs(5));
    assert_eq!(cfg.camera.device, "stub://camera");
    assert_eq!(cfg.camera.fps, 30);
    assert_eq!(cfg.camera.min_preview, Size::new(1280, 720));
    assert_eq!(cfg.camera.autofocus_initial_delay, Duration::from_secs(1));
    assert_eq!(cfg.camera.autofocus_interval, Duration::from_secs(2));
    assert_eq!(cfg.surface.clear_after, Duration::from_secs(2));
    assert_eq!(cfg.surface.content_url, None);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "throttle": { "interval_ms": 750 },
            "normalize": { "jpeg_quality": 85, "rotation_degrees": 270 },
            "recognizer": {
                "backend": "Scripted",
                "timeout_ms": 3000,
                "scripted_texts": ["hello", "world"]
            },
            "camera": {
                "device": "stub://rear",
                "fps": 15,
                "min_preview_width": 640,
                "min_preview_height": 480,
                "autofocus_interval_ms": 4000
            },
            "surface": {
                "clear_after_ms": 1500,
                "content_url": "https://file.example/search"
            }
        }"#,
    );

    std::env::set_var("TEXTCAM_CONFIG", file.path());
    std::env::set_var("TEXTCAM_THROTTLE_MS", "250");
    std::env::set_var("TEXTCAM_CAMERA_DEVICE", "stub://front");
    std::env::set_var("TEXTCAM_CONTENT_URL", "https://env.example/lookup");

    let cfg = TextcamConfig::load().expect("load config");

    assert_eq!(cfg.throttle_interval, Duration::from_millis(250));
    assert_eq!(cfg.normalize.jpeg_quality, 85);
    assert_eq!(cfg.normalize.rotation, Rotation::Cw270);
    assert_eq!(cfg.recognizer.backend, "scripted");
    assert_eq!(cfg.recognizer.timeout, Duration::from_millis(3000));
    assert_eq!(cfg.recognizer.scripted_texts, vec!["hello", "world"]);
    assert_eq!(cfg.camera.device, "stub://front");
    assert_eq!(cfg.camera.fps, 15);
    assert_eq!(cfg.camera.min_preview, Size::new(640, 480));
    assert_eq!(cfg.camera.autofocus_interval, Duration::from_secs(4));
    assert_eq!(cfg.camera.autofocus_initial_delay, Duration::from_secs(1));
    assert_eq!(cfg.surface.clear_after, Duration::from_millis(1500));
    assert_eq!(
        cfg.surface.content_url.as_deref(),
        Some("https://env.example/lookup")
    );

    let lifecycle = cfg.camera.lifecycle();
    assert_eq!(lifecycle.min_preview, Size::new(640, 480));
    assert_eq!(lifecycle.focus_interval, Duration::from_secs(4));
    assert_eq!(cfg.normalize.normalizer().rotation(), Rotation::Cw270);

    clear_env();
}

#[test]
fn explicit_path_is_used_without_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "surface": { "clear_after_ms": 900 } }"#);
    let cfg = TextcamConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.surface.clear_after, Duration::from_millis(900));
}

#[test]
fn blank_env_values_are_ignored() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TEXTCAM_RECOGNIZER", "  ");
    std::env::set_var("TEXTCAM_CAMERA_DEVICE", "");

    let cfg = TextcamConfig::load().expect("load config");
    assert_eq!(cfg.recognizer.backend, "scripted");
    assert_eq!(cfg.camera.device, "stub://camera");

    clear_env();
}

#[test]
fn rejects_non_numeric_env_durations() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TEXTCAM_RECOGNIZER_TIMEOUT_MS", "soon");
    let err = TextcamConfig::load().unwrap_err();
    assert!(err.to_string().contains("TEXTCAM_RECOGNIZER_TIMEOUT_MS"));

    clear_env();
}

#[test]
fn rejects_zero_throttle_interval() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TEXTCAM_THROTTLE_MS", "0");
    assert!(TextcamConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unsupported_rotation_and_quality() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let rotation = write_config(r#"{ "normalize": { "rotation_degrees": 45 } }"#);
    assert!(TextcamConfig::load_from(Some(rotation.path())).is_err());

    let quality = write_config(r#"{ "normalize": { "jpeg_quality": 0 } }"#);
    assert!(TextcamConfig::load_from(Some(quality.path())).is_err());
}

#[test]
fn http_recognizer_requires_endpoint() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TEXTCAM_RECOGNIZER", "http");
    let err = TextcamConfig::load().unwrap_err();
    assert!(err.to_string().contains("endpoint"));

    std::env::set_var("TEXTCAM_RECOGNIZER_ENDPOINT", "http://127.0.0.1:9900/ocr");
    let cfg = TextcamConfig::load().expect("load config");
    assert_eq!(cfg.recognizer.backend, "http");
    assert_eq!(
        cfg.recognizer.endpoint.as_deref(),
        Some("http://127.0.0.1:9900/ocr")
    );

    clear_env();
}

#[test]
fn invalid_config_file_is_reported() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("{ not json");
    let err = TextcamConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    let missing = file.path().with_extension("missing");
    let err = TextcamConfig::load_from(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}
