// Life of a request:
// 1. JSON body and cookies come in through the axum router
// 2. Protected routes pass the access-token gate first
// 3. The handler calls into `AuthService`:
//     - Register: check both stores, hash, insert, issue tokens
//     - Login: external store first, then primary, issue tokens
//     - Refresh: check blacklist, verify, consume ledger record, rotate
//     - Logout: blacklist both tokens, drop the refresh record
// 4. The handler sets or clears cookies and responds
//
// System components:
//  - Primary user store and token ledger (SQLite)
//  - External candidate store (MySQL, read-mostly)
//  - Token issuer and ledger

#![cfg_attr(test, allow(clippy::disallowed_methods))]

pub mod auth;
pub mod config;
pub mod http;
pub mod store;
pub mod time;
pub mod types;

mod e2e_tests;
