//! Recommended API entrypoints grouped by abstraction level.
//!
//! `client` covers applications issuing operations through [`crate::Client`].
//! `bridge` is for embedders wiring their own host runtime or library instance.

pub mod client {
    //! Everyday surface: the client, its configuration and host values.
    pub use crate::{
        BridgeConfig, BridgeError, CallId, CasToken, Client, ClientEvent, ErrorCode, HostFunction,
        HostValue, Result, StoreOptions,
    };
}

pub mod bridge {
    //! Seams for plugging in a host runtime or a client library instance.
    pub use crate::connection::{
        Command, InstanceOwner, LibraryInstance, LoopbackInstance, setup_callbacks,
    };
    pub use crate::dispatch::{CompletionCookie, CookieRegistry, ErrorEncoding, ResultPayload};
    pub use crate::host::{HandleScope, HostRuntime, InMemoryHost, Persistent};
}
