//! Command handlers for the `chub` CLI.

mod activate;
mod admin;
mod query;

pub use activate::{ActivateCommandInput, run_activate, run_deactivate};
pub use admin::{
    AdminAddInput, run_admin_add, run_admin_delete, run_admin_list, run_admin_refresh,
    run_admin_status,
};
pub use query::{QueryCommandInput, run_query};
