// SPDX-License-Identifier: GPL-3.0-only
pub mod cache;
pub mod events;
pub mod models;
pub mod service;

pub use service::{AssetPackBridge, BridgeOptions};
