//! Build script — embeds the build timestamp surfaced in serve startup logs.

fn main() {
    let now = chrono::Utc::now();
    println!(
        "cargo:rustc-env=BUILD_DATETIME={}",
        now.format("%Y-%m-%d %H:%M UTC")
    );
    // Only re-run if build.rs itself changes (not on every source file change)
    println!("cargo:rerun-if-changed=build.rs");
}
