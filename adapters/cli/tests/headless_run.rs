use std::{path::PathBuf, process::Command};

fn asset(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("maps").join(name)
}

fn run(extra: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_battle-city"))
        .arg(asset("arena.json"))
        .args(["--tuning"])
        .arg(asset("tuning.toml"))
        .args(extra)
        .output()
        .expect("failed to launch battle-city");

    assert!(
        output.status.success(),
        "battle-city exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf-8 output")
}

#[test]
fn bundled_arena_runs_to_completion() {
    let stdout = run(&["--ticks", "300", "--seed", "3"]);
    let summary = stdout.lines().last().expect("summary line");
    assert!(summary.starts_with("ticks=300 "), "unexpected summary: {summary}");
}

#[test]
fn equal_seeds_print_equal_summaries() {
    let args = ["--ticks", "200", "--seed", "11"];
    assert_eq!(run(&args), run(&args));
}

#[test]
fn print_map_echoes_the_grid() {
    let stdout = run(&["--ticks", "1", "--print-map"]);
    let rows: Vec<&str> = stdout.lines().take(9).collect();
    assert_eq!(rows.len(), 9);
    assert!(rows.iter().all(|row| row.chars().count() == 13));
}

#[test]
fn missing_map_is_reported() {
    let output = Command::new(env!("CARGO_BIN_EXE_battle-city"))
        .arg(asset("missing.json"))
        .output()
        .expect("failed to launch battle-city");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read map"), "stderr: {stderr}");
}

#[test]
fn help_lists_simulation_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_battle-city"))
        .arg("--help")
        .output()
        .expect("failed to launch battle-city");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--ticks", "--dt-ms", "--seed", "--tuning", "--print-map"] {
        assert!(stdout.contains(flag), "help is missing {flag}: {stdout}");
    }
}

#[test]
fn malformed_tuning_is_reported() {
    let output = Command::new(env!("CARGO_BIN_EXE_battle-city"))
        .arg(asset("arena.json"))
        .args(["--tuning"])
        .arg(asset("arena.json"))
        .output()
        .expect("failed to launch battle-city");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse tuning file"), "stderr: {stderr}");
}
