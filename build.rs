//! Generates the `rawquery.RawQuery` gRPC service glue.
//!
//! Messages are declared by hand with `prost` derives in `src/rpc/messages.rs`,
//! so the service is described with `tonic_build::manual` and no protoc is needed.

use tonic_build::manual::{Builder, Method, Service};

fn unary(name: &str, route: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type("crate::rpc::ExecuteRequest")
        .output_type(output)
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    let service = Service::builder()
        .name("RawQuery")
        .package("rawquery")
        .method(unary(
            "execute_scalar",
            "ExecuteScalar",
            "crate::rpc::ScalarResponse",
        ))
        .method(unary(
            "execute_single",
            "ExecuteSingle",
            "crate::rpc::SingleRowResponse",
        ))
        .method(unary(
            "execute_multiple",
            "ExecuteMultiple",
            "crate::rpc::RowSetResponse",
        ))
        .method(unary(
            "execute_non_query",
            "ExecuteNonQuery",
            "crate::rpc::NonQueryResponse",
        ))
        .build();

    Builder::new().compile(&[service]);
    println!("cargo:rerun-if-changed=build.rs");
}
