// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Tracing setup for the two binaries, mirroring the teacher's
//! `main.rs`: an `EnvFilter` defaulting to `penchy=info`, a compact
//! formatting layer, initialized once at process start. Library code
//! never configures a subscriber, only emits `tracing::*` calls.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "penchy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
