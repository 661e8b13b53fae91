//! Event types used by the TUI event loop.

use crossterm::event::KeyEvent;
use lumino_rs_protocol::{ChatReply, ModelList, StatusReply, Usage};

/// Events consumed by the TUI loop.
#[derive(Debug)]
pub enum AppEvent {
    /// Keyboard input.
    Input(KeyEvent),
    /// Bracketed paste from the terminal.
    Paste(String),
    /// Periodic tick for CPU refresh.
    Tick,
    /// Mouse wheel scroll; negative is up.
    Scroll(i16),
    /// Streamed content delta of the reply in flight.
    Token(String),
    /// Usage summary trailing a streamed reply.
    Usage(Usage),
    /// Streamed reply finished.
    StreamDone,
    /// Complete non-streaming reply.
    Reply(ChatReply),
    /// Model list fetched from the server.
    Models { list: ModelList, view: ModelsView },
    /// Outcome of a model switch or history reset.
    Status(StatusReply),
    /// A request failed before producing a reply.
    RequestFailed(String),
}

/// How a fetched model list is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelsView {
    /// Only refresh the header and picker state.
    Quiet,
    /// Print the list into the transcript.
    Listing,
    /// Open the model picker.
    Picker,
}
