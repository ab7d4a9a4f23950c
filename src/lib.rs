pub mod application {
    pub mod account_lookup;
    pub mod auth_service;
    pub mod service;
    pub mod session;
    pub mod transaction_flow;
}

pub mod data {
    pub mod session_store;
    pub mod transaction_repository;
    pub mod user_repository;
}

pub mod domain {
    pub mod error;
    pub mod models;
    pub mod repository;
    pub mod session;
    pub mod transfer_form;
    pub mod user;
}

pub mod infrastructure {
    pub mod config;
    pub mod geolocation;
    pub mod logging;
    pub mod security;
}

pub mod presentation {
    pub mod auth;
    pub mod handlers;
    pub mod middleware;
}
