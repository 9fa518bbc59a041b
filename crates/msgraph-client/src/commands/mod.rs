//! Command handlers.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod mail;

use std::future::Future;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use msgraph_core::OutputFormat;

/// Runs `work` behind a stderr spinner showing `message`.
///
/// On failure the spinner is replaced by `failure`, if given; the error
/// itself is reported by the caller.
pub(crate) async fn with_spinner<T, E, F>(
    message: &str,
    failure: Option<&str>,
    work: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = work.await;
    pb.finish_and_clear();

    if result.is_err()
        && let Some(failure) = failure
    {
        eprintln!("{} {}", "✖".red(), failure);
    }
    result
}

/// Prints a success line.
pub(crate) fn success(message: &str) {
    println!("{} {}", "✔".green(), message.green());
}

/// Prints the "nothing found" line for an empty result. JSON output prints
/// an empty array instead, so it stays parseable.
pub(crate) fn print_empty(format: OutputFormat, message: &str) {
    match format {
        OutputFormat::Json => println!("[]"),
        _ => println!("{}", message.yellow()),
    }
}

/// Prints a dimmed item count after table or text output.
pub(crate) fn print_count(format: OutputFormat, count: usize, noun: &str) {
    if format != OutputFormat::Json {
        println!("{}", format!("{} {}(s) found.", count, noun).dimmed());
    }
}
