//! Generated renderer source code.

use serde::{Deserialize, Serialize};

/// One code-generation attempt's output.
///
/// Written to `{scripts_dir}/{scene_name}.py`; attempts targeting the same
/// scene overwrite the same file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCode {
    /// Scene class name the source must define.
    pub scene_name: String,
    /// Full renderer source.
    pub source_code: String,
}

impl GeneratedCode {
    /// File name of the scratch script this code is persisted to.
    pub fn script_file_name(&self) -> String {
        format!("{}.py", self.scene_name)
    }
}
