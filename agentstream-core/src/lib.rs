pub mod attribution;
pub mod backend;
pub mod boundary;
pub mod config;
pub mod error;
pub mod extract;
pub mod host;
pub mod http_client;
pub mod keywords;
pub mod model;
pub mod normalizer;
pub mod response;
pub mod session;
pub mod sse;
pub mod stream;
pub mod telemetry;
pub mod todos;
#[cfg(test)]
pub mod test_util;
