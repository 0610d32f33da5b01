fn main() {
    // Manual tonic codegen for the log sink service. The message types are
    // prost-annotated structs in src/transport/grpc.rs, so no .proto file
    // is needed.
    let service = tonic_build::manual::Service::builder()
        .name("LogService")
        .package("logs")
        .method(
            tonic_build::manual::Method::builder()
                .name("write_log")
                .route_name("WriteLog")
                .input_type("crate::transport::grpc::LogRequest")
                .output_type("crate::transport::grpc::LogResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
