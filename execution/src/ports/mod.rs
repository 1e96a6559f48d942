//! External-collaborator interfaces only (`spec.md` §1's explicit non-goals: no in-crate
//! credential persistence, notification presentation, or master-contract download). Each port is
//! a thin trait; implementations live outside this crate.

pub mod credentials;
pub mod logging;
pub mod master_contract;
pub mod notification;
