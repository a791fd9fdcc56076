// Market data window and order execution backends
pub mod candle_window;
pub mod gateway;
pub mod live;
pub mod simulated;

pub use candle_window::CandleWindow;
pub use gateway::{CostBasis, ExecutionGateway, OrderRequest};
pub use live::{new_idempotency_key, LiveGateway};
pub use simulated::SimulatedGateway;
