#![forbid(unsafe_code)]

pub mod cli;
pub mod digest;
pub mod extract;
pub mod family;
pub mod fetch;
pub mod links;
pub mod logging;
pub mod net;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod summarize;
