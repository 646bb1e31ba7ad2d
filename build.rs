use std::process::Command;

/// Run a git command and return its trimmed stdout, if it succeeded.
fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();

    // Release tags report the plain crate version; everything else carries
    // the short commit hash so bug reports can be traced to a build.
    let build_version = if git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some() {
        version
    } else {
        match git(&["rev-parse", "--short", "HEAD"]) {
            Some(hash) if !hash.is_empty() => format!("{version}+{hash}"),
            _ => format!("{version}+dev"),
        }
    };

    println!("cargo:rustc-env=PRESENTER_BUILD_VERSION={build_version}");
}
