//! JSON messages exchanged with the file server.
//!
//! Every message is an object tagged by its `MR_Message` field:
//!
//! ```json
//! {"MR_Message":"Write_Files","files":[{"path":"a.frag","text":"...","guardAgainstOverwrite":true}]}
//! {"MR_Message":"Update_File","file":"a.frag","content":"..."}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFile {
    pub path: PathBuf,
    pub text: String,
    /// Ask the server not to clobber an existing file with different content.
    #[serde(rename = "guardAgainstOverwrite", default)]
    pub guard_against_overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "MR_Message")]
pub enum Message {
    #[serde(rename = "Write_Files")]
    WriteFiles { files: Vec<WriteFile> },

    /// A watched file changed; `content` is its new text.
    #[serde(rename = "Update_File")]
    UpdateFile { file: PathBuf, content: String },

    #[serde(rename = "Watch_Files")]
    WatchFiles { files: Vec<PathBuf> },

    #[serde(rename = "Unwatch_Files")]
    UnwatchFiles { files: Vec<PathBuf> },
}

impl Message {
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::Transport {
            msg: format!("encode message: {e}"),
        })
    }

    pub fn from_json(s: &str) -> Result<Self, EngineError> {
        serde_json::from_str(s).map_err(|e| EngineError::Transport {
            msg: format!("decode message: {e}"),
        })
    }
}
