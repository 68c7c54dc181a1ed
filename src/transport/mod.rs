// Transport layers for the estimation engine

pub mod http;
