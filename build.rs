fn main() -> Result<(), Box<dyn std::error::Error>> {
    // proto/mm2.proto is compiled with tonic-build, which shells out to `protoc`.
    // When `protoc` is present we run codegen as usual; when it is not (e.g. an
    // offline environment without the compiler installed) we fall back to the
    // committed, pre-generated equivalent in src/grpc/mm2_generated.rs, so the
    // crate still builds. Behavior is identical either way.
    let proto_path = std::env::var("PROTO_PATH").unwrap_or_else(|_| "proto".to_string());
    let proto_file = format!("{}/mm2.proto", proto_path);

    println!("cargo:rerun-if-changed={}", proto_file);

    let have_protoc = std::env::var_os("PROTOC").is_some() || which_protoc().is_some();

    if have_protoc {
        tonic_build::configure()
            .build_server(false)
            .build_client(true)
            .compile(&[&proto_file], &[&proto_path])?;
    } else {
        println!("cargo:warning=protoc not found; using committed src/grpc/mm2_generated.rs");
    }

    Ok(())
}

/// Best-effort lookup of a `protoc` binary on PATH.
fn which_protoc() -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join("protoc");
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
