//! gRPC client module

mod client;

pub use client::StreamingGatewayClient;

// Re-export protobuf types.
//
// Normally this is `tonic::include_proto!("mm2")`, which pulls in the file
// generated from proto/mm2.proto by tonic-build at compile time. That codegen
// requires `protoc`; where it is unavailable the equivalent generated output is
// committed in mm2_generated.rs and included directly.
pub mod mm2 {
    include!("mm2_generated.rs");
}
