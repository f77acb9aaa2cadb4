//! Per-listener channel: topology declaration, publishing and consuming.

use crate::error::BrokerError;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions, QueuePurgeOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, Consumer, ExchangeKind};
use tracing::{info, warn};
use uuid::Uuid;

const PERSISTENT_DELIVERY: u8 = 2;

/// A channel with `prefetch = 1` and an optional declared exchange.
///
/// Publishing requires [`BrokerChannel::declare_exchange`] (or
/// [`BrokerChannel::declare_bound_queue`], which declares it on the way) to
/// have succeeded first; publishing against an undeclared exchange is a
/// typed error rather than an async protocol failure.
pub struct BrokerChannel {
    channel: Channel,
    exchange: Option<String>,
}

impl BrokerChannel {
    pub(crate) async fn open(connection: &Connection) -> Result<Self, BrokerError> {
        let channel = connection.create_channel().await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        Ok(Self {
            channel,
            exchange: None,
        })
    }

    /// Declare the durable topic exchange this channel publishes to.
    pub async fn declare_exchange(&mut self, exchange_name: &str) -> Result<(), BrokerError> {
        self.channel
            .exchange_declare(
                exchange_name,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        info!(exchange = %exchange_name, "Declared exchange");
        self.exchange = Some(exchange_name.to_string());
        Ok(())
    }

    /// Declare a durable queue and bind it to the exchange with the given
    /// routing key. The exchange is declared first.
    pub async fn declare_bound_queue(
        &mut self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.declare_exchange(exchange_name).await?;
        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_bind(
                queue_name,
                exchange_name,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        info!(
            queue = %queue_name,
            exchange = %exchange_name,
            routing_key = %routing_key,
            "Created and bound queue"
        );
        Ok(())
    }

    /// Publish a persistent message to the declared exchange.
    pub async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let exchange = require_exchange(self.exchange.as_deref())?;
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY),
            )
            .await?
            .await?;
        info!(exchange = %exchange, routing_key = %routing_key, "Published message");
        Ok(())
    }

    /// Start consuming from a queue, yielding a lazy stream of deliveries.
    ///
    /// Dropping the stream (or cancelling the task that polls it) stops
    /// consumption.
    pub async fn consume(&self, queue_name: &str) -> Result<Consumer, BrokerError> {
        let consumer_tag = format!("worker-{}", Uuid::new_v4());
        let consumer = self
            .channel
            .basic_consume(
                queue_name,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    /// Drop all messages from a queue. Maintenance/test-harness operation.
    pub async fn purge_queue(&self, queue_name: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_purge(queue_name, QueuePurgeOptions::default())
            .await?;
        info!(queue = %queue_name, "Purged queue");
        Ok(())
    }

    /// Delete a queue. Maintenance/test-harness operation.
    pub async fn delete_queue(&self, queue_name: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_delete(queue_name, QueueDeleteOptions::default())
            .await?;
        info!(queue = %queue_name, "Deleted queue");
        Ok(())
    }

    /// Close the channel, logging instead of failing on error.
    pub async fn close(&self) {
        if let Err(e) = self.channel.close(200, "listener shutdown").await {
            warn!(error = %e, "Failed to close channel cleanly");
        }
    }
}

fn require_exchange(declared: Option<&str>) -> Result<&str, BrokerError> {
    declared.ok_or_else(|| BrokerError::ExchangeNotDeclared("<none>".to_string()))
}
