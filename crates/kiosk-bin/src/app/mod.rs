//! Application wiring and operator commands.

mod commands;
mod init;

pub use commands::{
    capture, clear_audit, clear_queue, export_audit, print_queue, print_status,
    set_delivery_setting, show_config, CaptureArgs,
};
pub use init::run_relay;
