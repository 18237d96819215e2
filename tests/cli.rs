use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::{tempdir, TempDir};

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.py"), "print('Hello from a')\n");
    write_file(&dir.path().join("b.txt"), "This is a text file\n");
    write_file(&dir.path().join("subdir/c.py"), "print('Hello from c')\n");
    write_file(&dir.path().join("node_modules/pkg/index.js"), "module.exports = 1\n");
    dir
}

/// A command isolated from the user's config and environment.
fn cmdc(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cmdc"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("APPDATA", home)
        .env("CMDC_COPY_CLIPBOARD", "false");
    for var in [
        "CMDC_FILTERS",
        "CMDC_IGNORE",
        "CMDC_RECURSIVE",
        "CMDC_DEPTH",
        "CMDC_PRINT_CONSOLE",
        "CMDC_TIKTOKEN_MODEL",
        "CMDC_TEXT_ENCODING",
        "CMDC_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_with_stdin(mut cmd: Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn cli_non_interactive_writes_output_file() {
    let dir = project();
    let home = tempdir().unwrap();
    let out = home.path().join("context.txt");

    let output = cmdc(home.path())
        .arg(dir.path())
        .args(["-r", "--non-interactive", "-f", "py", "-o"])
        .arg(&out)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("<summary>\n<selected_files>\n"));
    assert!(text.contains("<directory_structure>"));
    assert!(text.contains("<open_file>\na.py\n<contents>\nprint('Hello from a')\n"));
    assert!(text.contains("c.py\n<contents>\nprint('Hello from c')\n"));
    assert!(!text.contains("b.txt\n<contents>"));
    assert!(!text.contains("index.js"));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Directory structure:"));
    assert!(stderr.contains("File contents saved to"));
}

#[test]
fn cli_prints_to_console_without_clipboard() {
    let dir = project();
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .arg(dir.path())
        .args(["--non-interactive", "--no-summary"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("<summary>"));
    assert!(stdout.contains("<open_file>\na.py\n"));
    assert!(stdout.contains("<open_file>\nb.txt\n"));
    assert!(!stdout.contains("c.py"));
}

#[test]
fn cli_json_output() {
    let dir = project();
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .arg(dir.path())
        .args(["--non-interactive", "--json", "--depth", "2", "--filter", ".py"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let files = v.get("files").and_then(|f| f.as_array()).unwrap();

    let paths: Vec<&str> = files.iter().map(|f| f["path"].as_str().unwrap()).collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], "a.py");
    assert!(paths[1].ends_with("c.py"));

    let total: u64 = files.iter().map(|f| f["tokens"].as_u64().unwrap()).sum();
    assert_eq!(v["total_tokens"].as_u64().unwrap(), total);
    assert!(total > 0);
}

#[test]
fn cli_interactive_selection_from_stdin() {
    let dir = project();
    let home = tempdir().unwrap();
    let out = home.path().join("picked.txt");

    let mut cmd = cmdc(home.path());
    cmd.arg(dir.path()).arg("-o").arg(&out);
    let output = run_with_stdin(cmd, "9\n2\n");

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("1. a.py ("));
    assert!(stderr.contains("Please select at least one file"));

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("<open_file>\nb.txt\n"));
    assert!(!text.contains("<open_file>\na.py\n"));
}

#[test]
fn cli_cancelled_prompt_is_not_an_error() {
    let dir = project();
    let home = tempdir().unwrap();
    let out = home.path().join("never.txt");

    let mut cmd = cmdc(home.path());
    cmd.arg(dir.path()).arg("-o").arg(&out);
    let output = run_with_stdin(cmd, "q\n");

    assert!(output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().contains("No files selected."));
    assert!(!out.exists());
}

#[test]
fn cli_no_files_found_exit_code() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("node_modules/x.js"), "x\n");
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .arg(dir.path())
        .args(["-r", "--non-interactive"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(5));
    assert!(String::from_utf8(output.stderr).unwrap().contains("no files found"));
}

#[test]
fn cli_missing_directory_exit_code() {
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .arg(home.path().join("does-not-exist"))
        .arg("--json")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let v: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(v["error"].as_str().unwrap().contains("path not found"));
}

#[test]
fn cli_invalid_env_config_exit_code() {
    let dir = project();
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .arg(dir.path())
        .arg("--non-interactive")
        .env("CMDC_DEPTH", "deep")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_add_ignore_persists() {
    let dir = project();
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .args(["--add-ignore", "subdir"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(home.path().join("cmdc/config.toml").exists());

    let output = cmdc(home.path()).arg("--list-ignore").output().unwrap();
    let listed = String::from_utf8(output.stdout).unwrap();
    assert!(listed.lines().any(|l| l == "subdir"));
    assert!(listed.lines().any(|l| l == ".git"));

    let output = cmdc(home.path())
        .arg(dir.path())
        .args(["-r", "--non-interactive", "--no-summary"])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("a.py"));
    assert!(!stdout.contains("c.py"));
}

#[test]
fn cli_init_refuses_to_overwrite() {
    let home = tempdir().unwrap();

    let first = cmdc(home.path()).arg("--init").output().unwrap();
    assert!(first.status.success());
    let written = fs::read_to_string(home.path().join("cmdc/config.toml")).unwrap();
    assert!(written.contains("[cmdc]"));

    let second = cmdc(home.path()).arg("--init").output().unwrap();
    assert_eq!(second.status.code(), Some(1));

    let forced = cmdc(home.path()).args(["--init", "--force"]).output().unwrap();
    assert!(forced.status.success());
}

#[test]
fn cli_init_asks_questions() {
    let home = tempdir().unwrap();

    let mut cmd = cmdc(home.path());
    cmd.arg("--init");
    let output = run_with_stdin(cmd, "n\ny\n2\n\nlogs\nrs\n\n\n");
    assert!(output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().contains("Default scanning depth [1]: "));

    let output = cmdc(home.path())
        .args(["--config-show", "--json"])
        .env_remove("CMDC_COPY_CLIPBOARD")
        .output()
        .unwrap();
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["copy_to_clipboard"], false);
    assert_eq!(v["recursive"], true);
    assert_eq!(v["depth"], 2);
    assert_eq!(v["filters"], serde_json::json!([".rs"]));
    assert!(v["ignore_patterns"].as_array().unwrap().contains(&serde_json::json!("logs")));
}

#[test]
fn cli_lossy_text_encoding() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("latin.txt"), b"caf\xe9\n").unwrap();
    let home = tempdir().unwrap();

    let strict = cmdc(home.path())
        .arg(dir.path())
        .args(["--non-interactive", "--no-summary"])
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&strict.stdout).contains("Error reading latin.txt"));

    let lossy = cmdc(home.path())
        .arg(dir.path())
        .args(["--non-interactive", "--no-summary"])
        .env("CMDC_TEXT_ENCODING", "utf8-lossy")
        .output()
        .unwrap();
    assert!(lossy.status.success());
    let stdout = String::from_utf8(lossy.stdout).unwrap();
    assert!(stdout.contains("<open_file>\nlatin.txt\n<contents>\ncaf\u{fffd}\n"));

    let flagged = cmdc(home.path())
        .arg(dir.path())
        .args(["--non-interactive", "--no-summary", "--text-encoding", "utf8-lossy"])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8(flagged.stdout).unwrap(), stdout);
}

#[test]
fn cli_clipboard_holder_exits_on_empty_input() {
    let home = tempdir().unwrap();
    let mut cmd = cmdc(home.path());
    cmd.arg("--hold-clipboard");

    assert!(run_with_stdin(cmd, "").status.success());
}

#[test]
fn cli_config_show_reflects_env() {
    let home = tempdir().unwrap();

    let output = cmdc(home.path())
        .args(["--config-show", "--json"])
        .env("CMDC_FILTERS", ".rs,.toml")
        .output()
        .unwrap();

    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["filters"], serde_json::json!([".rs", ".toml"]));
    assert_eq!(v["copy_to_clipboard"], false);
    assert_eq!(v["tiktoken_model"], "o200k_base");
}

#[test]
fn cli_completions() {
    let home = tempdir().unwrap();
    let output = cmdc(home.path()).args(["--completions", "bash"]).output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("cmdc"));
}
