/// Application configuration, parsed from the command line or the environment.
pub mod config;

/// The HTTP API: routers, handlers, extractors and the error type shared by all of them.
pub mod http;

/// Outgoing notification mail.
pub mod mailer;

/// Database access, one controller per table group.
pub mod models;

/// Uploaded files on local disk.
pub mod uploads;
