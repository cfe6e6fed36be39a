//! Saved anime GIFs.

use serde::{Deserialize, Serialize};
use teloxide::types::Animation;

/// One saved GIF (stored in the `gifs` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredGif {
    pub file_id: String,
    /// Stable across bots, used to spot duplicates.
    pub file_unique_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl From<&Animation> for StoredGif {
    fn from(animation: &Animation) -> Self {
        Self {
            file_id: animation.file.id.to_string(),
            file_unique_id: animation.file.unique_id.to_string(),
            width: animation.width,
            height: animation.height,
            duration: animation.duration.seconds(),
            file_name: animation.file_name.clone(),
        }
    }
}

/// Whether GIF save mode is on in a chat (stored in `gif_save_mode`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GifSaveMode {
    pub chat_id: i64,
    pub mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_animation() {
        let animation: Animation = serde_json::from_value(serde_json::json!({
            "file_id": "gif-1",
            "file_unique_id": "u-1",
            "file_size": 2048,
            "width": 320,
            "height": 240,
            "duration": 3,
            "file_name": "nya.mp4",
        }))
        .unwrap();
        let gif = StoredGif::from(&animation);

        assert_eq!(gif.file_id, "gif-1");
        assert_eq!(gif.file_unique_id, "u-1");
        assert_eq!((gif.width, gif.height, gif.duration), (320, 240, 3));
        assert_eq!(gif.file_name.as_deref(), Some("nya.mp4"));
    }
}
