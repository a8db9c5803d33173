//! Prepared-statement façade over the database. Every query the rest of the
//! crate needs is named and lives here rather than scattered across command
//! handlers — mirroring the donor crate's `handlers::messages` module, which
//! keeps its SQL inline in functions named for the operation they perform,
//! just grouped by entity instead of by HTTP route.

pub mod bans;
pub mod config;
pub mod google;
pub mod history;
pub mod responses;
pub mod transactions;
pub mod users;
