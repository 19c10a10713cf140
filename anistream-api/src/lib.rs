//! anistream-api: HTTP surface for the anistream server.

pub mod http;
