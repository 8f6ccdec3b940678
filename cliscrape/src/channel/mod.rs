//! Channel layer: prompt patterns, the read buffer and the channel engine.
//!
//! This module turns a raw byte transport into prompt-delimited exchanges:
//! ANSI stripping, echo handling, tail-window prompt search, timeouts,
//! interactive sequences and trigger-driven reads.

mod buffer;
mod cancel;
mod interactive;
mod patterns;
mod pty;
mod triggers;

pub use buffer::PatternBuffer;
pub use cancel::CancelHandle;
pub(crate) use cancel::Operation;
pub use interactive::{
    InteractiveBuilder, InteractiveBuilderWithInput, InteractiveEvent, InteractiveOutput,
    InteractiveStep,
};
pub use patterns::{PromptPattern, cached_pattern_count, compile_cached};
pub use pty::{Channel, ChannelConfig, ChannelOutput, SendOptions};
pub use triggers::{Termination, Trigger, TriggerAction, TriggerHandler, TriggerOutput};

pub(crate) use patterns::describe;
pub(crate) use pty::{ERROR_TAIL, ReadEvent, echo_end, loggable};
