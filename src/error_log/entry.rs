use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// One recorded error. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    id: String,
    message: String,
    timestamp: DateTime<Utc>,
}

impl ErrorLogEntry {
    pub(crate) fn new(message: &str) -> Self {
        let timestamp = Utc::now();
        Self {
            id: entry_id(&timestamp),
            message: message.trim().to_string(),
            timestamp,
        }
    }

    /// Creation time in milliseconds and a random base-36 suffix, e.g.
    /// `1760601600000-k3x9q0z1a`. Unique in practice, not guaranteed.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn entry_id(timestamp: &DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", timestamp.timestamp_millis(), suffix)
}
