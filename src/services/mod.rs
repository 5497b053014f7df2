pub mod calendar;
pub mod chat;
pub mod events;
pub mod guard;
pub mod lifecycle;
pub mod ratings;
pub mod reviews;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testutil;
