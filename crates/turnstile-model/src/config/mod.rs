mod pool;
pub use pool::PoolConfig;

mod gate;
pub use gate::GateConfig;
