fn main() {
    // Keep `check-cfg` happy even when we skip `tauri_build::build()` (core-only builds).
    println!("cargo:rustc-check-cfg=cfg(desktop)");
    println!("cargo:rustc-check-cfg=cfg(mobile)");

    // `tauri_build::build()` expects the `tauri` crate to be present and reads env vars it
    // exports (e.g. `DEP_TAURI_DEV`). The library and its tests build without the desktop
    // runtime, so the build helpers only run for the `app` feature.
    if std::env::var_os("CARGO_FEATURE_APP").is_some() {
        tauri_build::build()
    }
}
