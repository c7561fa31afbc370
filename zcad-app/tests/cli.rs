use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DRAWING: &str = r#"{
    "header": { "$INSUNITS": 6 },
    "tables": { "layer": { "layers": {
        "0": { "name": "0" },
        "WALLS": { "name": "WALLS", "color_index": 1 }
    } } },
    "entities": [
        { "type": "LINE", "layer": "WALLS", "start": [0, 0], "end": [4, 0] },
        { "type": "CIRCLE", "layer": "0", "center": [2, 2], "radius": 1 }
    ]
}"#;

fn write_drawing(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("plan.json");
    fs::write(&path, DRAWING).expect("写入测试图纸失败");
    path
}

fn zcad(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("zcad-app").expect("找不到 zcad-app 可执行文件");
    cmd.current_dir(dir).env_remove("ZCAD_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_shapes_to_stdout_by_default() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = write_drawing(dir.path());

    zcad(dir.path())
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"dxf-shape-1\""))
        .stdout(predicate::str::contains("\"layer_id\": \"dxf-layer-WALLS\""))
        .stdout(predicate::str::contains("\"units_scale\": 100.0"));
}

#[test]
fn writes_shape_and_svg_files() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = write_drawing(dir.path());
    let shapes = dir.path().join("out/shapes.json");
    let svg = dir.path().join("out/backdrop.svg");

    zcad(dir.path())
        .arg(&input)
        .arg("--shapes")
        .arg(&shapes)
        .arg("--svg")
        .arg(&svg)
        .args(["--units", "cm", "--color-scheme", "fixed-gray-153"])
        .args(["--floor-id", "floor-1", "--read-only"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&shapes).expect("缺少形状输出")).expect("形状输出不是 JSON");
    assert_eq!(json["units_scale"], 1.0);
    assert_eq!(json["width"], 4.0);
    assert_eq!(json["shapes"][0]["stroke_color"], "#999999");
    assert_eq!(json["shapes"][0]["floor_id"], "floor-1");
    assert_eq!(json["layers"][1]["locked"], true);

    let markup = fs::read_to_string(&svg).expect("缺少 SVG 输出");
    assert!(markup.starts_with("<svg "));
    assert!(markup.contains("data-layer=\"WALLS\""));
    assert!(markup.contains("<circle cx=\"2\" cy=\"2\" r=\"1\""));
}

#[test]
fn config_file_supplies_options() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = write_drawing(dir.path());
    let config = dir.path().join("zcad.toml");
    fs::write(
        &config,
        "[import]\nsource_units = \"mm\"\ncolor_scheme = \"custom\"\ncustom_color = \"#123456\"\n",
    )
    .expect("写入配置失败");

    zcad(dir.path())
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stroke_color\": \"#123456\""))
        .stdout(predicate::str::contains("\"units_scale\": 0.1"));
}

#[test]
fn missing_input_fails_with_message() {
    let dir = TempDir::new().expect("创建临时目录失败");
    zcad(dir.path())
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("读取图纸"));
}

#[test]
fn invalid_units_are_rejected() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = write_drawing(dir.path());
    zcad(dir.path())
        .arg(&input)
        .args(["--units", "furlongs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("furlongs"));
}
