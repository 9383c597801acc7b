fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_files = &["proto/echo.proto"];
    let proto_folder = "proto";

    println!("cargo:rerun-if-changed={proto_folder}");

    // Compiled with protox, so building the fixture does not need `protoc`.
    let file_descriptors = protox::compile(proto_files, [proto_folder])?;

    tonic_prost_build::configure()
        .build_client(false)
        .compile_fds(file_descriptors)?;

    Ok(())
}
