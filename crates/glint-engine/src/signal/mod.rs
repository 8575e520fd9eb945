//! Typed broadcast channels.
//!
//! A [`Signal`] carries one kind of event. Subscribers receive `&E` synchronously,
//! in subscription order, on the thread that emits. Each subscription is an owned
//! [`Subscription`] handle; dropping it detaches the callback.

mod channel;

pub use channel::{Signal, Subscription};
