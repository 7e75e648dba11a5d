pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod replay;
pub mod report;
pub mod state;
pub mod time;
pub mod utils;

pub use replay::{InvocationEvent, read_events, replay};
pub use report::{CollectingListener, ResultForwarder, TestInvocationListener};
