//! Sidechat is a two-pane terminal workspace with a streaming chat sidebar.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation state machine, the streaming
//!   accumulator, the HTTP transport and configuration.
//! - [`ui`] renders the terminal interface and runs the interactive event loop
//!   that drives user input and display updates.
//! - [`api`] defines the chat completion payloads sent over the wire.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which resolves settings and dispatches into
//! [`ui::chat_loop`] for interactive sessions or [`cli::say`] for one-shot
//! prompts.

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
