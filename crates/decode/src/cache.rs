use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arranger_transport::AudioArc;

use crate::decode_file;

/// Resolves a persisted sound id back into decoded audio.
///
/// Returned buffers are treated as read-only and live as long as any clip
/// references them.
pub trait SoundProvider {
    fn load_sound(&mut self, sound_id: &str) -> Option<AudioArc>;
}

impl SoundProvider for HashMap<String, AudioArc> {
    fn load_sound(&mut self, sound_id: &str) -> Option<AudioArc> {
        self.get(sound_id).cloned()
    }
}

/// Decoded buffers keyed by path, so one file is decoded once no matter
/// how many clips use it.
#[derive(Debug, Default)]
pub struct AudioCache {
    entries: HashMap<PathBuf, AudioArc>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> anyhow::Result<AudioArc> {
        if let Some(audio) = self.entries.get(path) {
            return Ok(audio.clone());
        }
        let audio = decode_file(path)?;
        self.entries.insert(path.to_path_buf(), audio.clone());
        Ok(audio)
    }

    pub fn insert(&mut self, path: PathBuf, audio: AudioArc) {
        self.entries.insert(path, audio);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A directory of sounds addressed by their path relative to the root.
#[derive(Debug)]
pub struct SoundLibrary {
    root: PathBuf,
    cache: AudioCache,
}

impl SoundLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: AudioCache::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Accepts ids relative to the root (`drums/kick.wav`) as well as paths
    /// that already exist as given.
    pub fn resolve(&self, sound_id: &str) -> Option<PathBuf> {
        let with_root = self.root.join(sound_id);
        if with_root.exists() {
            return Some(with_root);
        }
        let as_is = PathBuf::from(sound_id);
        as_is.exists().then_some(as_is)
    }

    /// The id a file is persisted under: its path relative to the root.
    pub fn sound_id_for(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }
}

impl SoundProvider for SoundLibrary {
    fn load_sound(&mut self, sound_id: &str) -> Option<AudioArc> {
        let Some(path) = self.resolve(sound_id) else {
            tracing::warn!(sound_id, root = %self.root.display(), "sound not found");
            return None;
        };
        match self.cache.get_or_load(&path) {
            Ok(audio) => Some(audio),
            Err(e) => {
                tracing::warn!(sound_id, "failed to load sound: {e:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_wav;
    use tempfile::tempdir;

    #[test]
    fn test_cache_decodes_once() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snare.wav");
        write_wav(&path, 480, 48000, 1);

        let mut cache = AudioCache::new();
        let first = cache.get_or_load(&path).expect("load");
        let second = cache.get_or_load(&path).expect("load");

        assert!(first.ptr_eq(&second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_library_resolves_relative_ids() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("drums")).expect("mkdir");
        let path = dir.path().join("drums").join("kick.wav");
        write_wav(&path, 480, 44100, 2);

        let mut library = SoundLibrary::new(dir.path());

        assert_eq!(library.sound_id_for(&path), "drums/kick.wav");
        let audio = library.load_sound("drums/kick.wav").expect("sound");
        assert_eq!(audio.frames(), 480);
        assert!(library.load_sound("drums/missing.wav").is_none());
    }

    #[test]
    fn test_library_skips_undecodable_sound() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("junk.wav"), b"junk").expect("write");

        let mut library = SoundLibrary::new(dir.path());
        assert!(library.load_sound("junk.wav").is_none());
        assert!(library.cache().is_empty());
    }

    #[test]
    fn test_map_provider() {
        let mut sounds = HashMap::new();
        sounds.insert("tone".to_string(), AudioArc::new(vec![0.0; 10], 48000, 1));

        assert!(sounds.load_sound("tone").is_some());
        assert!(sounds.load_sound("other").is_none());
    }
}
