pub mod api;
pub mod compile;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod harvest;
pub mod proxy;

pub use compile::TradeRebuilder;
pub use config::Config;
pub use datasource::{
    DataSource, DataSourceError, DataSourceFactory, HyperliquidClientFactory,
    HyperliquidDataSource, MockDataSource,
};
pub use db::{init_db, Repository};
pub use domain::{Address, Coin, CompletedTrade, Decimal, Fill, TimeMs};
pub use engine::TradeReconstructor;
pub use error::AppError;
pub use harvest::{HarvestConfig, HarvestPool, HarvestSummary, RangeFetcher};
pub use proxy::ProxyDirectory;
