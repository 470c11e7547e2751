//! Terminal output handling for interactive sessions.
//!
//! ANSI stripping, tail search and Junos prompt recognition.

mod buffer;
mod patterns;

pub use buffer::OutputBuffer;
pub use patterns::JunosPrompts;
