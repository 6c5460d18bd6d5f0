mod client;

pub use client::config::Config;
pub use client::frames::{ClientFrame, ServerFrame};
pub use client::stats::Stats;
pub use client::{connect_with_config, Client, ClientTx, ServerRx};
pub use realtime_types as types;
