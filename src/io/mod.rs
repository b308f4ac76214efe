//! Infrastructure layer.
//!
//! - [`queue`]: wake-on-signal producer/consumer queue between pipeline
//!   stages
//! - [`publisher`]: publishing sink contract and message types
//! - [`trajectory`]: trajectory dump and parse (TUM layout)

pub mod publisher;
pub mod queue;
pub mod trajectory;
