use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gofpower"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("gofpower_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn write_run_file(gof: serde_json::Value) -> PathBuf {
    let cfg = serde_json::json!({
        "dataset": {
            "kind": "mvn",
            "num_trials": 4,
            "num_samples": 60,
            "mean": [0.0, 0.0],
            "cov": [[1.0, 0.0], [0.0, 1.0]],
            "ptb_mean": 5.0,
            "seed": 3
        },
        "gof": gof
    });
    let path = tmp_path("run.json");
    std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
    path
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "command should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

#[test]
fn version_smoke() {
    let out = run(&["version"]);
    assert!(out.status.success(), "version should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("gofpower "), "unexpected stdout: {}", stdout);
}

#[test]
fn modes_lists_builtin_flags() {
    let v = stdout_json(&run(&["modes"]));
    let modes = v.as_array().expect("modes should be an array");
    assert_eq!(modes.len(), 13);
    let lrt = modes.iter().find(|m| m["mode"] == "lrt-b-g").unwrap();
    assert_eq!(lrt["builtin"], true);
    let ks = modes.iter().find(|m| m["mode"] == "ks").unwrap();
    assert_eq!(ks["builtin"], false);
}

#[test]
fn generate_then_reuse_cache() {
    let cfg = write_run_file(serde_json::json!({ "test_mode": "lrt-chi2-g", "alter_num_samples": 20 }));
    let root = tmp_path("root");
    let (cfg_s, root_s) = (cfg.to_string_lossy().into_owned(), root.to_string_lossy().into_owned());

    let first = stdout_json(&run(&["generate", "--config", &cfg_s, "--root", &root_s]));
    assert_eq!(first["provenance"], "generated");
    assert_eq!(first["data_name"], "MVN");
    assert_eq!(first["num_trials"], 4);
    let artifact = PathBuf::from(first["artifact"].as_str().unwrap());
    assert!(artifact.is_file());
    assert!(root.join("raw").is_dir());

    let second = stdout_json(&run(&["generate", "--config", &cfg_s, "--root", &root_s]));
    assert_eq!(second["provenance"], "cached");
    assert_eq!(second["fingerprint"], first["fingerprint"]);

    let forced = stdout_json(&run(&["generate", "--config", &cfg_s, "--root", &root_s, "--force"]));
    assert_eq!(forced["provenance"], "generated");

    let _ = std::fs::remove_dir_all(&root);
    let _ = std::fs::remove_file(&cfg);
}

#[test]
fn run_writes_experiment_json() {
    let cfg = write_run_file(serde_json::json!({
        "test_mode": "lrt-b-g",
        "num_bootstrap": 50,
        "alter_num_samples": 20,
        "seed": 1
    }));
    let root = tmp_path("root");
    let output = tmp_path("result.json");

    let out = run(&[
        "run",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--root",
        root.to_string_lossy().as_ref(),
        "--output",
        output.to_string_lossy().as_ref(),
        "--threads",
        "2",
    ]);
    assert!(out.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(v["test_mode"], "lrt-b-g");
    assert_eq!(v["num_trials"], 4);
    let records = v["records"].as_array().unwrap();
    assert_eq!(records.len(), 4);
    for (i, rec) in records.iter().enumerate() {
        assert_eq!(rec["trial"], i);
        let pvalues = rec["pvalue"].as_array().unwrap();
        assert_eq!(pvalues.len(), 3);
        assert!(pvalues.iter().all(|p| (0.0..=1.0).contains(&p.as_f64().unwrap())));
    }
    assert!(v["rejection_rate"].as_f64().unwrap() >= 0.8);

    let _ = std::fs::remove_dir_all(&root);
    let _ = std::fs::remove_file(&cfg);
    let _ = std::fs::remove_file(&output);
}

#[test]
fn unknown_mode_fails() {
    let cfg = write_run_file(serde_json::json!({ "test_mode": "lrt-x", "alter_num_samples": 20 }));
    let root = tmp_path("root");
    let out = run(&["run", "--config", cfg.to_string_lossy().as_ref(), "--root", root.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    assert!(!root.join("processed").exists(), "no dataset should be generated for an invalid config");
    let _ = std::fs::remove_file(&cfg);
}

#[test]
fn injected_only_mode_is_rejected() {
    let cfg = write_run_file(serde_json::json!({ "test_mode": "cvm", "alter_num_samples": 20 }));
    let root = tmp_path("root");
    let out = run(&["run", "--config", cfg.to_string_lossy().as_ref(), "--root", root.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no built-in engine"), "unexpected stderr: {}", stderr);
    let _ = std::fs::remove_dir_all(&root);
    let _ = std::fs::remove_file(&cfg);
}

#[test]
fn generate_writes_summary_to_output_file() {
    let cfg = write_run_file(serde_json::json!({ "test_mode": "mmd", "alter_num_samples": 20 }));
    let root = tmp_path("root");
    let output = tmp_path("summary.json");
    let out = run(&[
        "generate",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--root",
        root.to_string_lossy().as_ref(),
        "--output",
        output.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "generate should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(v["provenance"], "generated");
    assert_eq!(v["dim"], 2);
    assert_eq!(v["num_samples"], 60);

    let _ = std::fs::remove_dir_all(&root);
    let _ = std::fs::remove_file(&cfg);
    let _ = std::fs::remove_file(&output);
}
