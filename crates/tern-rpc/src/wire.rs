//! JSON messages exchanged with node monitors and frontends.

use serde::{Deserialize, Serialize};

use tern_core::{FullTaskId, hex_bytes};

/// Node monitor endpoint answering load probes.
pub const LOAD_PATH: &str = "/v1/load";
/// Node monitor endpoint accepting task launches.
pub const LAUNCH_PATH: &str = "/v1/launch";
/// Frontend endpoint receiving task status messages.
pub const MESSAGES_PATH: &str = "/v1/messages";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub app_id: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub queue_length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendMessage {
    pub task: FullTaskId,
    pub status: i32,
    #[serde(with = "hex_bytes")]
    pub message: Vec<u8>,
}
