pub mod client;
pub mod handshake;
pub mod input;
pub mod reconcile;

pub use client::{ClientConfig, ClientPhase, NetClient};
pub use input::{gate_bits, InputPacer, PlayableBand};
pub use reconcile::{Reconciler, TrackedEntity};
