//! Spotify Recommendation Backend Library
//!
//! This library drives the OAuth 2.0 authorization against the Spotify Web API,
//! keeps the resulting session fresh for the lifetime of the process, and serves
//! song recommendations derived from the user's listening history.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for login, callback, recommendations and playlists
//! - `config` - Configuration management and environment variables
//! - `error` - Error types and their HTTP representation
//! - `management` - The authorization and session manager
//! - `prediction` - Client for the external recommendation model service
//! - `server` - Router construction and the HTTP server loop
//! - `spotify` - Spotify Web API client implementation
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers

pub mod api;
pub mod config;
pub mod error;
pub mod management;
pub mod prediction;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used at the outer edges of the application (startup, the binary) where the
/// concrete error type does not matter and only needs to be reported.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Listening on {}", addr);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only used for failures during startup. Once the server is running, errors
/// are reported with [`warning!`] and turned into HTTP responses.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for recoverable conditions: rejected callbacks, failed token refreshes,
/// upstream errors relayed to a caller.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
