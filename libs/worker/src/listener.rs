//! Listener fan-out: one consume loop per config.
//!
//! A listener owns a channel with `prefetch = 1`, so messages on its queue
//! are processed strictly in delivery order, one at a time. Listeners are
//! independent; only the loss of the broker connection itself takes them
//! all down, at which point the supervisor surfaces the error and the
//! process exits for external supervision to restart it.

use crate::controller::{Disposition, EventController};
use crate::error::WorkerError;
use crate::metrics;
use amqp_broker::{BrokerChannel, BrokerConnection, BrokerError, topology};
use config_vault_client::Config;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The consume loop for one config's queue.
pub struct Listener {
    queue_name: String,
    channel: BrokerChannel,
    controller: EventController,
}

impl Listener {
    /// Open a channel, declare and bind the input queue for `config`.
    pub async fn bind(
        connection: &BrokerConnection,
        exchange: &str,
        config: &Config,
        controller: EventController,
    ) -> Result<Self, WorkerError> {
        let mut channel = connection.create_channel().await?;
        let queue_name =
            topology::input_queue_name(&config.provider, &config.service, &config.source);
        let routing_key =
            topology::input_routing_key(&config.provider, &config.service, &config.source);
        channel
            .declare_bound_queue(&queue_name, exchange, &routing_key)
            .await?;
        Ok(Self {
            queue_name,
            channel,
            controller,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Consume until shutdown, an unrecoverable broker error, or the
    /// optional overall timeout (used by tests; production passes `None`).
    pub async fn listen(
        &self,
        shutdown: watch::Receiver<bool>,
        timeout: Option<Duration>,
    ) -> Result<(), WorkerError> {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.consume_loop(shutdown)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(queue = %self.queue_name, "Listening to the queue timed out");
                    self.channel.close().await;
                    Ok(())
                }
            },
            None => self.consume_loop(shutdown).await,
        }
    }

    async fn consume_loop(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), WorkerError> {
        let mut deliveries = self.channel.consume(&self.queue_name).await?;
        info!(
            queue = %self.queue_name,
            config_id = %self.controller.config_id(),
            "Listener started"
        );

        loop {
            if *shutdown.borrow() {
                info!(queue = %self.queue_name, "Received shutdown signal, stopping listener");
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(queue = %self.queue_name, "Received shutdown signal, stopping listener");
                        break;
                    }
                }
                next = deliveries.next() => {
                    let Some(delivery) = next else {
                        warn!(queue = %self.queue_name, "Delivery stream closed");
                        return Err(WorkerError::ConsumerClosed(self.queue_name.clone()));
                    };
                    let delivery = delivery.map_err(BrokerError::from)?;

                    match self.controller.process(&delivery.data).await {
                        Disposition::Ack => amqp_broker::ack(&delivery).await?,
                        Disposition::Reject => amqp_broker::reject(&delivery).await?,
                        // Unacked deliveries return to the queue when the
                        // channel closes; the broker redelivers them.
                        Disposition::Leave => {}
                    }
                }
            }
        }

        self.channel.close().await;
        Ok(())
    }
}

/// Owns the lifetime of every listener task.
pub struct ListenerSupervisor {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<Result<(), WorkerError>>,
}

impl Default for ListenerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerSupervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Spawn a listener task running until shutdown.
    pub fn spawn(&mut self, listener: Listener) {
        self.spawn_with_timeout(listener, None);
    }

    /// Spawn a listener with an overall timeout. Test harness variant.
    pub fn spawn_with_timeout(&mut self, listener: Listener, timeout: Option<Duration>) {
        let shutdown = self.shutdown_tx.subscribe();
        self.tasks
            .spawn(async move { listener.listen(shutdown, timeout).await });
        metrics::set_live_listeners(self.tasks.len() as f64);
    }

    pub fn listener_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every listener to stop at its next suspension point.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Handle for signalling shutdown from another task (e.g. on SIGTERM).
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Wait for all listeners. The first listener error cascades a shutdown
    /// to the others and is returned once they have drained.
    pub async fn join(mut self) -> Result<(), WorkerError> {
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            metrics::set_live_listeners(self.tasks.len() as f64);
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Listener failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                        let _ = self.shutdown_tx.send(true);
                    }
                }
                Err(join_error) => {
                    error!(error = %join_error, "Listener task panicked");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
