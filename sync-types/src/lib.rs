//! # sync-types
//!
//! Wire format types for the storesync cross-context action protocol.
//!
//! This crate provides the foundational types used across all storesync crates:
//! - [`Action`] - A named event dispatched into a store
//! - [`ActionId`], [`FrameId`] - Identity types
//! - [`WireMessage`] - Protocol messages (Ping, Pong, Action)
//! - [`Frame`] - What a transport carries: a message plus its transfer list
//! - [`Transferable`] - A handle that moves across a transport instead of being copied
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod action;
mod envelope;
mod error;
mod ids;
mod messages;
mod transfer;

pub use action::Action;
pub use envelope::Frame;
pub use error::TypesError;
pub use ids::{ActionId, FrameId};
pub use messages::{MessageType, SerializedAction, WireMessage, WireValue};
pub use transfer::Transferable;
