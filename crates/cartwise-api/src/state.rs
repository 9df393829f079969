//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use cartwise_chat::{GenerationEngine, StreamCoordinator};
use cartwise_core::config::CartwiseConfig;
use cartwise_storage::{ConversationRepository, Database, ProductRepository};

/// Shared application state.
///
/// All fields are cheap to clone across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CartwiseConfig>,
    pub database: Arc<Database>,
    pub products: ProductRepository,
    pub conversations: ConversationRepository,
    /// Runs chat turns against the repositories above.
    pub coordinator: StreamCoordinator,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: CartwiseConfig,
        database: Database,
        engine: Arc<dyn GenerationEngine>,
    ) -> Self {
        let config = Arc::new(config);
        let database = Arc::new(database);
        let products = ProductRepository::new(Arc::clone(&database));
        let conversations = ConversationRepository::new(Arc::clone(&database));
        let coordinator = StreamCoordinator::new(
            Arc::clone(&config),
            Arc::new(conversations.clone()),
            Arc::new(products.clone()),
            engine,
        );

        Self {
            config,
            database,
            products,
            conversations,
            coordinator,
            start_time: Instant::now(),
        }
    }
}
