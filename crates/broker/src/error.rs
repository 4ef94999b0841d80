#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(#[source] lapin::Error),

    #[error("channel creation failed: {0}")]
    Channel(#[source] lapin::Error),

    #[error("topology declaration failed for {name}: {source}")]
    Declare {
        name: String,
        #[source]
        source: lapin::Error,
    },

    #[error("publish to exchange {exchange} failed: {source}")]
    Publish {
        exchange: &'static str,
        #[source]
        source: lapin::Error,
    },

    #[error("consume from queue {queue} failed: {source}")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("message serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
