pub mod auth;
pub mod routes;
pub mod utils;
