use crate::event::TelemetryEvent;
use crate::store::{CurrentStateStore, RawEventStore, StoreError};

pub const HUMIDITY_MIN: f64 = 0.0;
pub const HUMIDITY_MAX: f64 = 100.0;

// Readings outside [0, 100] are sensor noise and are dropped without any
// side effect; both boundaries are valid readings.
pub fn humidity_in_range(value: f64) -> bool {
    (HUMIDITY_MIN..=HUMIDITY_MAX).contains(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
}

// The transport owns redelivery: Err from `handle` means the event must be
// delivered again, Ok (either outcome) means it is settled.
#[derive(Clone)]
pub struct IngestionHandler {
    state_store: CurrentStateStore,
    raw_store: RawEventStore,
}

impl IngestionHandler {
    pub fn new(state_store: CurrentStateStore, raw_store: RawEventStore) -> Self {
        Self {
            state_store,
            raw_store,
        }
    }

    pub async fn handle(&self, event: &TelemetryEvent) -> Result<Outcome, StoreError> {
        if !humidity_in_range(event.humidity) {
            tracing::debug!(
                device = %event.device_id,
                humidity = event.humidity,
                "dropping out-of-range humidity reading"
            );
            return Ok(Outcome::Rejected);
        }

        // Both writes are independent; there is no cross-store transaction,
        // so a failure here can leave one store written. Redelivery makes the
        // state upsert converge and may duplicate the raw row.
        tokio::try_join!(
            self.state_store.upsert(event),
            self.raw_store.append(event)
        )?;

        Ok(Outcome::Accepted)
    }
}
