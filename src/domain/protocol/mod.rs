//! Wire protocol types: inbound/outbound frames, message decoding and
//! statement parameters.

mod frames;
mod inbound;
mod placeholders;
mod sql_arg;

pub use frames::{InboundFrame, OutboundFrame};
pub use inbound::InboundMessage;
pub use placeholders::to_native_placeholders;
pub use sql_arg::SqlArg;
