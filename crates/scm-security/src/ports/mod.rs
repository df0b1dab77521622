//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that the transport glue calls
//! - **Outbound (Driven)**: Collaborators the validator needs

pub mod inbound;
pub mod outbound;
