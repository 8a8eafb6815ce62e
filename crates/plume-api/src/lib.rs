pub mod auth;
pub mod credentials;
pub mod error;
pub mod federated;
pub mod messages;
pub mod middleware;
pub mod pages;
pub mod respond;
pub mod routes;
pub mod session;
