// The worker service is described here instead of in a `.proto` file. The
// message types are hand-written `prost` structs in `src/rpc.rs`, so the
// build only needs `tonic-build` to emit the client and server stubs and
// does not depend on `protoc` being installed.
use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::{input}"))
        .output_type(format!("crate::rpc::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    let worker = Service::builder()
        .name("Worker")
        .package("mapreduce")
        .method(method(
            "health",
            "Health",
            "HealthRequest",
            "HealthResponse",
        ))
        .method(method(
            "run_map",
            "RunMap",
            "MapTaskRequest",
            "MapTaskResponse",
        ))
        .method(method(
            "run_shuffle",
            "RunShuffle",
            "ShuffleTaskRequest",
            "ShuffleTaskResponse",
        ))
        .method(method(
            "receive_shuffle",
            "ReceiveShuffle",
            "ShuffleDelivery",
            "ShuffleAck",
        ))
        .method(method(
            "run_reduce",
            "RunReduce",
            "ReduceTaskRequest",
            "ReduceTaskResponse",
        ))
        .method(method(
            "fetch_results",
            "FetchResults",
            "FetchResultsRequest",
            "FetchResultsResponse",
        ))
        .method(method("reset", "Reset", "ResetRequest", "ResetResponse"))
        .build();

    Builder::new().compile(&[worker]);
    println!("cargo:rerun-if-changed=build.rs");
}
