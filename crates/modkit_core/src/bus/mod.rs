//! Named-channel publish/subscribe bus.
//!
//! # Responsibility
//! - Decouple running instances: they only ever see channel names.
//! - Bind publish/subscribe capability onto sandboxes without exposing the
//!   channel table.
//!
//! # Invariants
//! - Subscribers of one channel run strictly in registration order.
//! - `publish` is synchronous; every live subscriber has returned before it
//!   does.
//! - A subscription removed by `unsubscribe` is never invoked again, even by
//!   a dispatch that was already in flight.

pub mod mediator;
