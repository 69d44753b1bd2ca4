mod config;

pub use config::{
    ChainSettings, OracleSettings, ProtocolSettings, Settings, SnapshotSettings,
};
