// SPDX-License-Identifier: GPL-3.0-only
pub mod archive;
pub mod client;
pub mod http;
pub mod traits;

pub use http::HttpAssetPackManager;
pub use traits::{AssetPackManager, StateUpdateListener, TaskOutcome};
