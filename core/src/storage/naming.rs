//! Names for the local scratch file and the remote object.

use crate::audio::utils::gen_id;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactName {
    /// File name inside the scratch directory
    pub file_name: String,
    /// Object key inside the bucket
    pub object_key: String,
}

/// Chooses where a run's audio lands locally and remotely.
pub trait ArtifactNaming: Send + Sync {
    fn next_name(&self) -> ArtifactName;
}

fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Same name every run. Concurrent runs race on the same file and object.
#[derive(Clone, Debug)]
pub struct FixedNaming {
    prefix: String,
    file_name: String,
}

impl FixedNaming {
    pub fn new(prefix: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            file_name: file_name.into(),
        }
    }
}

impl Default for FixedNaming {
    fn default() -> Self {
        Self::new("tts-audio", "audio.mp3")
    }
}

impl ArtifactNaming for FixedNaming {
    fn next_name(&self) -> ArtifactName {
        ArtifactName {
            file_name: self.file_name.clone(),
            object_key: object_key(&self.prefix, &self.file_name),
        }
    }
}

/// Appends a per-run id to the stem: `audio.mp3` → `audio-<id>.mp3`.
#[derive(Clone, Debug)]
pub struct UniqueNaming {
    prefix: String,
    stem: String,
    extension: Option<String>,
}

impl UniqueNaming {
    pub fn new(prefix: impl Into<String>, file_name: &str) -> Self {
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
            _ => (file_name.to_string(), None),
        };
        Self {
            prefix: prefix.into(),
            stem,
            extension,
        }
    }
}

impl ArtifactNaming for UniqueNaming {
    fn next_name(&self) -> ArtifactName {
        let file_name = match &self.extension {
            Some(ext) => format!("{}-{}.{}", self.stem, gen_id(), ext),
            None => format!("{}-{}", self.stem, gen_id()),
        };
        ArtifactName {
            object_key: object_key(&self.prefix, &file_name),
            file_name,
        }
    }
}
