//! Domain types for TimeSync.
//!
//! This module contains pure values and rules with no socket or task
//! dependencies, so everything here is unit-testable without a network.
//!
//! - [`endpoint`] – the `(address, port)` pair a server advertises.
//! - [`period`] – the operator-chosen polling period and its bounds.
//! - [`offset`] – the round-trip clock-offset estimator.
//! - [`config`] – well-known network parameters shared by server and client.
//! - [`failure`] – the closed error taxonomy every loop switches on.

pub mod config;
pub mod endpoint;
pub mod failure;
pub mod offset;
pub mod period;
