use thiserror::Error;

/// Errors that can occur while talking to the broker.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// AMQP protocol or connection error from the underlying client.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Every connection attempt failed.
    #[error("failed to connect to broker at '{url}' after {attempts} attempts")]
    ConnectExhausted { url: String, attempts: u32 },

    /// Publish was attempted before any exchange was declared on the channel.
    #[error("exchange '{0}' not declared")]
    ExchangeNotDeclared(String),
}

impl BrokerError {
    /// Whether this error means the broker connection itself is gone.
    ///
    /// A lost connection terminates every listener; the process exits and
    /// external supervision restarts it.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::ConnectExhausted { .. } => true,
            Self::Amqp(e) => {
                let err_str = e.to_string().to_lowercase();
                err_str.contains("connection")
                    || err_str.contains("disconnected")
                    || err_str.contains("broken pipe")
                    || err_str.contains("reset by peer")
                    || err_str.contains("refused")
                    || err_str.contains("io error")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_exhausted_display() {
        let err = BrokerError::ConnectExhausted {
            url: "amqp://rabbitmq:6572".to_string(),
            attempts: 5,
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to broker at 'amqp://rabbitmq:6572' after 5 attempts"
        );
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_exchange_not_declared_is_not_connection_error() {
        let err = BrokerError::ExchangeNotDeclared("services".to_string());
        assert!(!err.is_connection_error());
    }
}
