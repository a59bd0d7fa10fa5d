//! Outbound notices to the chat that issued a command.

pub mod port;
