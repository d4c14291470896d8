use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::driver::Driver;
use crate::models::request::Request;
use crate::models::trip::Trip;
use crate::observability::metrics::Metrics;
use crate::store::Collection;

pub struct AppState {
    pub config: Config,
    pub requests: Collection<Request>,
    pub drivers: Collection<Driver>,
    pub trips: Collection<Trip>,
    pub match_tx: mpsc::Sender<Uuid>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Uuid>) {
        let (match_tx, match_rx) = mpsc::channel(config.match_queue_size);
        let requests = Collection::new(config.event_buffer_size, config.tx_retry_limit);
        let drivers = Collection::new(config.event_buffer_size, config.tx_retry_limit);
        let trips = Collection::new(config.event_buffer_size, config.tx_retry_limit);

        (
            Self {
                config,
                requests,
                drivers,
                trips,
                match_tx,
                metrics: Metrics::new(),
            },
            match_rx,
        )
    }
}
