// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

fn main() {
    // Local builds report the nearest git tag; release tarballs without a
    // checkout fall back to the Cargo.toml version.
    if let Ok(output) = std::process::Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
    {
        let desc = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() && !desc.is_empty() {
            let version = desc.strip_prefix('v').unwrap_or(&desc);
            println!("cargo:rustc-env=LASH_VERSION={version}");
        }
    }
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/tags");
}
