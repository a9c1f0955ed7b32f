// Build provenance for `serframe version --extended`.
fn main() {
    for (var, exported) in [
        ("TARGET", "SERFRAME_BUILD_TARGET"),
        ("PROFILE", "SERFRAME_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}
