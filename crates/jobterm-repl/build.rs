//! Build script for jobterm-repl: embeds a git description and build date
//! for `jobterm --version`.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    // Tarball builds have no .git to watch
    if std::path::Path::new("../../.git/HEAD").exists() {
        println!("cargo::rerun-if-changed=../../.git/HEAD");
    }

    let revision = git(&["describe", "--always", "--dirty"]).unwrap_or_else(|| "unknown".into());
    let build_date = chrono::Utc::now().format("%Y-%m-%d");

    println!("cargo:rustc-env=JOBTERM_GIT_REV={revision}");
    println!("cargo:rustc-env=JOBTERM_BUILD_DATE={build_date}");
}
