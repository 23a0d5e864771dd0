//! 门户响应解析 (ResponseParser)

pub mod detect;
pub mod parser;
pub mod selectors;
pub mod token;

pub use detect::ConnectivityPolicy;
