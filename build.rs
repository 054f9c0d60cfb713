//! Build script: embeds the git hash and checks for cmake when whisper.cpp
//! is going to be compiled.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "whisper") {
        check_cmake();
    }
}

fn check_cmake() {
    match Command::new("cmake").arg("--version").output() {
        Ok(out) if out.status.success() => {}
        _ => {
            println!("cargo::warning=The whisper feature builds whisper.cpp and needs cmake.");
            println!("cargo::warning=Install it (e.g. sudo apt install cmake) or build without --features whisper.");
        }
    }
}
