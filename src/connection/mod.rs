//! Boundary with the callback-driven key-value client library.

pub mod config;
pub mod instance;
pub mod loopback;
pub mod shim;

pub use config::BridgeConfig;
pub use instance::{
    ArithmeticCallback, ArithmeticResponse, CallbackTable, Command, ConfigurationCallback,
    ErrorCallback, GetCallback, GetResponse, InstanceOwner, LibraryInstance, RemoveCallback,
    RemoveResponse, SUPPORTED_RESPONSE_VERSION, StoreCallback, StoreResponse, TouchCallback,
    TouchResponse,
};
pub use loopback::{DeliveryOrder, LoopbackInstance};
pub use shim::setup_callbacks;
