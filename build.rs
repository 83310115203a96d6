//! Stamps the startup banner with build provenance
//!
//! `AIRMOUSE_BUILD_STAMP` is the UTC build time and `AIRMOUSE_REVISION` the
//! `git describe` of the source tree. Both fall back to `unknown` when the
//! tool is missing, so packaged builds outside a checkout still compile.

use std::process::Command;

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn main() {
    let stamp = command_output("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .unwrap_or_else(|| "unknown".into());
    let revision = command_output("git", &["describe", "--always", "--dirty"])
        .unwrap_or_else(|| "unknown".into());

    println!("cargo:rustc-env=AIRMOUSE_BUILD_STAMP={stamp}");
    println!("cargo:rustc-env=AIRMOUSE_REVISION={revision}");

    for path in [".git/HEAD", ".git/refs", ".git/index"] {
        println!("cargo:rerun-if-changed={path}");
    }
}
