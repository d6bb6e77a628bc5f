/// Ensure `.build/agent/` exists so `include_dir!()` never panics.
///
/// Release builds drop the per-platform agent executables there before
/// compiling with `--features bundled-agent`; local builds get an empty
/// directory.
use std::fs;
use std::path::PathBuf;

fn main() {
    let agent_dir: PathBuf = [env!("CARGO_MANIFEST_DIR"), "..", ".build", "agent"]
        .iter()
        .collect();

    if std::env::var_os("CARGO_FEATURE_BUNDLED_AGENT").is_some() && !agent_dir.is_dir() {
        fs::create_dir_all(&agent_dir)
            .unwrap_or_else(|e| panic!("create {}: {e}", agent_dir.display()));
    }

    println!("cargo::rerun-if-changed=../.build/agent");
}
