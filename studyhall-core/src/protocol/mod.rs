//! Protocol module for chat exchanges and the answer stream
//!
//! This module defines the exchange data model and the line-oriented wire
//! format spoken by the answering service.

pub mod codec;
pub mod types;

pub use codec::{decode_line, DecodeError, LineDecoder, DEFAULT_MAX_LINE_BYTES};
pub use types::{AskRequest, Exchange, ExchangeId, ExchangeStatus, Role, StreamFragment};
