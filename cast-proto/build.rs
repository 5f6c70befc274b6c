fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Ensure protoc is available via vendored binary for reproducible builds
    if let Ok(path) = protoc_bin_vendored::protoc_bin_path() {
        std::env::set_var("PROTOC", path);
    }

    // Message types only; the cast channel has no gRPC services
    tonic_build::configure()
        .build_server(false)
        .build_client(false)
        .compile(&["proto/cast_channel.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/cast_channel.proto");
    Ok(())
}
