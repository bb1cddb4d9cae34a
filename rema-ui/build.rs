//! Build identification for the rema-ui startup banner
//!
//! Exports `REMA_GIT_HASH`, `REMA_BUILD_TIMESTAMP` and `REMA_BUILD_PROFILE`.
//! The hash gains a `-dirty` suffix when the working tree has local edits.

use std::process::Command;

/// Run git and return trimmed stdout, or None outside a checkout
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn source_revision() -> String {
    match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .map(|status| !status.is_empty())
                .unwrap_or(false);
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    }
}

fn main() {
    // Branch switches and commits move HEAD
    if let Some(head) = git(&["rev-parse", "--git-path", "HEAD"]) {
        println!("cargo:rerun-if-changed={}", head);
    }
    if let Some(index) = git(&["rev-parse", "--git-path", "index"]) {
        println!("cargo:rerun-if-changed={}", index);
    }
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");

    let built = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=REMA_GIT_HASH={}", source_revision());
    println!("cargo:rustc-env=REMA_BUILD_TIMESTAMP={}", built);
    println!("cargo:rustc-env=REMA_BUILD_PROFILE={}", profile);
}
