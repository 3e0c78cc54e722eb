// Concrete adapters: shared HTTP client and report sinks

pub mod http_client;
pub mod report_sink;

pub use http_client::HttpJsonClient;
pub use report_sink::{ConsoleSink, JsonFileSink};
