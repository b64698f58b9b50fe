// SPDX-License-Identifier: MIT
mod loader;
mod schema;
mod tracing_init;

pub use loader::load;
pub use schema::EngineConfig;
pub use tracing_init::init_tracing;
