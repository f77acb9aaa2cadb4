//! Broker adapter over AMQP (RabbitMQ).
//!
//! Provides:
//! - robust connection establishment with bounded retries
//! - per-listener channels with `prefetch = 1` (one unacked delivery per
//!   channel at a time, the primary per-listener concurrency throttle)
//! - durable topic-exchange topology declaration and queue binding
//! - persistent publishing and a lazy consume stream
//!
//! All other crates talk to the broker through this adapter; lapin types
//! leak only as the re-exported [`Delivery`] and [`DeliveryStream`].

mod channel;
mod connection;
mod error;
pub mod topology;

pub use channel::BrokerChannel;
pub use connection::BrokerConnection;
pub use error::BrokerError;

/// One inbound message, acknowledged or rejected exactly once.
pub use lapin::message::Delivery;
/// Lazy stream of deliveries for one queue.
pub use lapin::Consumer as DeliveryStream;

use lapin::options::{BasicAckOptions, BasicNackOptions};

/// Acknowledge a delivery.
pub async fn ack(delivery: &Delivery) -> Result<(), BrokerError> {
    delivery.ack(BasicAckOptions::default()).await?;
    Ok(())
}

/// Reject a delivery without requeueing it.
pub async fn reject(delivery: &Delivery) -> Result<(), BrokerError> {
    delivery
        .nack(BasicNackOptions {
            requeue: false,
            ..Default::default()
        })
        .await?;
    Ok(())
}
