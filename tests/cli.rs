use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_preset(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp preset");
    tmp.write_all(xml.as_bytes()).expect("write preset");
    tmp
}

#[test]
fn summary_lists_scene_uniforms_and_panel() {
    let mut cmd = Command::cargo_bin("raging-sea").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains(
            "Water surface: 40x40 units, 258x258 segments (67081 vertices, 133128 triangles)",
        ))
        .stdout(contains("Viewport: 1280x720 @1x"))
        .stdout(contains(" - uTime (number) = 0"))
        .stdout(contains(" - uBigwavesFrequency (vec2) = (0.4, 0.5)"))
        .stdout(contains(" - uDepthColor (color) = #065589"))
        .stdout(contains(" - uSmallIterations (integer) = 4"))
        .stdout(contains("Tuning panel (closed, 340px):"))
        .stdout(contains(" - uSmallIterations [0, 5] step 1 = 4"))
        .stdout(contains(" - DepthColor (color) = #065589"));
}

#[test]
fn preset_is_applied_through_the_panel() {
    let preset = write_preset(
        r#"<preset>
    <control name="uSmallIterations">12</control>
    <control name="uColorOffset">0.08</control>
    <color name="SurfaceColor">#ffffff</color>
</preset>
"#,
    );
    let mut cmd = Command::cargo_bin("raging-sea").expect("binary exists");
    cmd.arg("--width")
        .arg("800")
        .arg("--height")
        .arg("600")
        .arg("--preset")
        .arg(preset.path())
        .arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Viewport: 800x600 @1x"))
        .stdout(contains(" - uSmallIterations (integer) = 5"))
        .stdout(contains(" - uColorOffset (number) = 0.08"))
        .stdout(contains(" - uSurfaceColor (color) = #ffffff"));
}

#[test]
fn malformed_preset_fails() {
    let preset = write_preset(r#"<preset><color name="DepthColor">navy</color></preset>"#);
    let mut cmd = Command::cargo_bin("raging-sea").expect("binary exists");
    cmd.arg("--preset").arg(preset.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to apply preset"));
}

#[test]
fn unknown_flags_are_rejected() {
    let mut cmd = Command::cargo_bin("raging-sea").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fullscreen"));
}
