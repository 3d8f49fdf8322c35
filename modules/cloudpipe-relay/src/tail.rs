use anyhow::Result;
use async_trait::async_trait;
use cloudpipe_engine::{Event, EventHandler};
use tracing::info;

/// Logs every record on one stream.
pub struct TailHandler {
    name: String,
    stream: String,
}

impl TailHandler {
    pub const EVENT_TYPE: &'static str = "RELAY_TAIL";

    pub fn new(stream: &str) -> Self {
        Self {
            name: format!("relay-tail:{stream}"),
            stream: stream.to_string(),
        }
    }
}

#[async_trait]
impl EventHandler for TailHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> &str {
        Self::EVENT_TYPE
    }

    async fn handle(&self, event: Event) -> Result<()> {
        let payload = serde_json::to_string(event.data())?;
        info!(
            stream = self.stream.as_str(),
            event_type = event.stored_type().unwrap_or("<untyped>"),
            payload = payload.as_str(),
            "Event"
        );
        Ok(())
    }
}
