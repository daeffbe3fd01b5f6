// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod agent;
pub mod api;
pub mod batch;
pub mod completion;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod server;
pub mod telemetry;
pub mod transport;
pub mod watermark;
