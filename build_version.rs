// Shared by the client and server build scripts via include!.
// Stamps the workspace version into OUT_DIR/version.rs for the
// build-version feature.

fn main() {
    let version = std::env::var("CARGO_PKG_VERSION").expect("cargo sets CARGO_PKG_VERSION");
    let out_dir = std::env::var("OUT_DIR").expect("cargo sets OUT_DIR");

    let version_file = std::path::Path::new(&out_dir).join("version.rs");
    std::fs::write(&version_file, format!("pub const VERSION: &str = \"{version}\";"))
        .expect("unable to write version file");

    println!("cargo:rerun-if-changed=../build_version.rs");
    println!("cargo:rerun-if-changed=../Cargo.toml");
}
