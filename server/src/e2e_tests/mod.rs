//! End-to-end tests at the service and router level.
//!
//! Each test file covers one operation or scenario, running the real
//! `AuthService` over in-process stores and a manual clock so every outcome
//! is deterministic.

#![cfg(test)]

mod helpers;

mod test_authorize;
mod test_http;
mod test_login;
mod test_logout;
mod test_refresh;
mod test_register;
mod test_sqlite_backend;
