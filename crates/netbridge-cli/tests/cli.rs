use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const NET: &str = r#"
name = "linear"
seed = 5

[[layer]]
name = "input"
type = "memory_data"
top = ["data", "label"]
batch_size = 2
channels = 2

[[layer]]
name = "fc"
type = "inner_product"
bottom = ["data"]
top = ["pred"]
num_output = 1

[[layer]]
name = "loss"
type = "euclidean_loss"
bottom = ["pred", "label"]
top = ["loss"]
"#;

const SOLVER: &str = r#"
net = "net.toml"
base_lr = 0.01
max_iter = 10
"#;

fn netbridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_netbridge"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("NETBRIDGE_MODE")
        .env_remove("NETBRIDGE_DEVICE")
        .env_remove("NETBRIDGE_STRICT_SHAPES")
        .output()
        .unwrap()
}

fn fixture(script: impl FnOnce(&Path) -> String) -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("net.toml"), NET).unwrap();
    fs::write(dir.path().join("solver.toml"), SOLVER).unwrap();
    let path = dir.path().join("script.nb");
    fs::write(&path, script(dir.path())).unwrap();
    let path = path.to_string_lossy().to_string();
    (dir, path)
}

fn quoted(path: &Path) -> String {
    serde_json::to_string(&path.to_string_lossy()).unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_training_script() {
    let (_dir, script) = fixture(|dir| {
        format!(
            r#"
# train a tiny linear model
$solver = get_solver {solver}
$attrs = solver_get_attr $solver
net_set_input_arrays $attrs.hNet_net {{"single": {{"dims": [1, 1, 2, 4], "data": [1, 0, 0, 1, 1, 1, -1, 0]}}}} [1, -2, -1, -1] 1
solver_step $solver 3
$iter = solver_get_iter $solver
$layers = net_get_attr $attrs.hNet_net
$type = layer_get_type $layers.hLayer_layers[2]
"#,
            solver = quoted(&dir.join("solver.toml"))
        )
    });

    let output = netbridge(&["run", &script]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("$iter = 3"), "{}", out);
    assert!(out.contains("$type = 'InnerProduct'"), "{}", out);
}

#[test]
fn test_failing_command_aborts() {
    let (_dir, script) = fixture(|dir| {
        format!(
            "$net = get_net {} \"train\"\nnet_forward $net\n$key = get_init_key\n",
            quoted(&dir.join("net.toml"))
        )
    });
    let output = netbridge(&["run", &script]);
    assert!(!output.status.success());
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("line 2"), "{}", err);
    assert!(!stdout(&output).contains("$key"));
}

#[test]
fn test_stale_handle_after_reset() {
    let (_dir, script) = fixture(|dir| {
        format!(
            "$net = get_net {} \"test\"\nreset\nnet_reshape $net\n",
            quoted(&dir.join("net.toml"))
        )
    });
    let output = netbridge(&["run", &script]);
    assert!(!output.status.success());
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("stale handle"), "{}", err);
}

#[test]
fn test_mode_flag() {
    let (_dir, script) = fixture(|_| "$key = get_init_key\n".to_string());
    let output = netbridge(&["run", &script, "--mode", "gpu", "--strict-shapes"]);
    assert!(output.status.success());

    let output = netbridge(&["run", &script, "--mode", "tpu"]);
    assert!(!output.status.success());
}

#[test]
fn test_config_file() {
    let (dir, script) = fixture(|_| "set_device 0\n".to_string());
    let config = dir.path().join("bridge.toml");
    fs::write(&config, "mode = \"gpu\"\nstrict_shapes = true\n").unwrap();
    let output = netbridge(&["run", &script, "--config", &config.to_string_lossy()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    fs::write(&config, "colour = \"blue\"\n").unwrap();
    let output = netbridge(&["run", &script, "--config", &config.to_string_lossy()]);
    assert!(!output.status.success());
}

#[test]
fn test_commands_listing() {
    let output = netbridge(&["commands"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("get_solver"));
    assert!(out.contains("net_set_input_arrays(hNet, data, labels, memory_data_layer_index)"));
    assert!(!out.contains("jacobian"));
}

#[test]
fn test_version() {
    let output = netbridge(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("netbridge "));
}
