include!("../build_version.rs");
