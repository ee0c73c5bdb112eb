use std::process::Command;

fn codeindex(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_codeindex"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("OLLAMA_URL")
        .env_remove("OLLAMA_MODEL")
        .output()
        .unwrap()
}

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = codeindex(dir.path(), &["init"]);
    assert!(
        output.status.success(),
        "codeindex init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".codeindex.toml");
    assert!(config_path.exists(), ".codeindex.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[embedding]"));
    assert!(content.contains("[search]"));

    let config: codeindex_core::CodeIndexConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.search.top_k, 5);
    assert_eq!(config.chunking.max_chunk_size, 1000);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".codeindex.toml"), "# existing").unwrap();

    let output = codeindex(dir.path(), &["init"]);

    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".codeindex.toml")).unwrap(),
        "# existing"
    );
}

#[test]
fn search_without_index_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = codeindex(dir.path(), &["search", "where is auth"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("search failed"), "stderr: {stderr}");
}

#[test]
fn reload_without_index_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = codeindex(dir.path(), &["reload"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to reload index"));
}

#[test]
fn stats_without_index_reports_empty() {
    let dir = tempfile::tempdir().unwrap();

    let output = codeindex(dir.path(), &["stats"]);

    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["totalChunks"], 0);
    assert_eq!(stats["modelName"], "nomic-embed-text");
}

#[test]
fn malformed_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".codeindex.toml"), "[search\ntop_k = ").unwrap();

    let output = codeindex(dir.path(), &["stats"]);

    assert!(!output.status.success());
}
