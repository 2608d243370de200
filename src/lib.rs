//! URL shortener with accounts, bearer-token sessions and visit counting.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod dao;
pub mod error;
pub mod links;
pub mod model;
pub mod password;
pub mod routes;
pub mod utils;
