// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Channel subscription model.

use serde::{Deserialize, Serialize};

/// A user (`subscriber`) following another user's channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber: String,
    pub channel: String,
    pub created_at: String,
}

impl Subscription {
    /// Document ID: one subscription per (subscriber, channel) pair.
    pub fn doc_id(subscriber: &str, channel: &str) -> String {
        format!("{}_{}", subscriber, channel)
    }
}
