#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown
)]

pub mod api;
pub mod app;
pub mod cli;
pub mod events;
pub mod log;
#[cfg(feature = "desktop-notify")]
pub mod notify;
pub mod poller;
pub mod resolver;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testutil;
