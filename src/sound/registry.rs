// Format registry for sound decoders
//
// Maps file extensions to decoder entry points. The registry is owned by the
// caller (normally an `AudioContext`) and populated before the first decode.

use std::collections::HashMap;
use std::path::Path;

use super::decoder::DecodeFn;
use super::wav;

/// A registered sound format
#[derive(Clone)]
pub struct SoundFormatEntry {
    /// Human-readable format name
    pub name: &'static str,
    /// Lowercase extension without the dot
    pub extension: String,
    /// Decoder entry point
    pub decoder: DecodeFn,
}

impl std::fmt::Debug for SoundFormatEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundFormatEntry")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

/// Registry of sound decoders keyed by file extension.
///
/// Extensions are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: HashMap<String, SoundFormatEntry>,
}

impl FormatRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in WAVE decoder installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for ext in wav::EXTENSIONS {
            registry.register(wav::NAME, ext, wav::decode);
        }
        registry
    }

    /// Register a decoder for an extension.
    ///
    /// A leading dot is ignored. An existing entry for the same extension
    /// is overwritten.
    pub fn register(&mut self, name: &'static str, extension: &str, decoder: DecodeFn) {
        let key = normalize(extension);
        log::debug!("registering {} decoder for .{}", name, key);
        self.formats.insert(
            key.clone(),
            SoundFormatEntry {
                name,
                extension: key,
                decoder,
            },
        );
    }

    /// Look up a decoder by extension.
    pub fn lookup(&self, extension: &str) -> Option<&SoundFormatEntry> {
        self.formats.get(&normalize(extension))
    }

    /// Look up a decoder by the extension of `path`.
    pub fn lookup_path(&self, path: &Path) -> Option<&SoundFormatEntry> {
        let ext = path.extension()?.to_str()?;
        self.lookup(ext)
    }

    /// Return the number of registered extensions.
    pub fn count(&self) -> usize {
        self.formats.len()
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::decoder::{DecodeError, DecodeOptions, DecodeResult, ReadSeek};
    use crate::sound::timeline::Sound;

    fn refuse(_: &mut dyn ReadSeek, _: &DecodeOptions) -> DecodeResult<Sound> {
        Err(DecodeError::UnsupportedFormat(0))
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = FormatRegistry::new();
        assert_eq!(registry.count(), 0);
        assert!(registry.lookup("wav").is_none());
    }

    #[test]
    fn test_defaults_register_wave() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.extensions(), vec!["wav", "wave"]);
        assert_eq!(registry.lookup("wav").map(|e| e.name), Some("Wave"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FormatRegistry::with_defaults();
        assert!(registry.lookup("WAV").is_some());
        assert!(registry.lookup(".Wav").is_some());
        assert!(registry.lookup("ogg").is_none());
    }

    #[test]
    fn test_lookup_path() {
        let registry = FormatRegistry::with_defaults();
        assert!(registry.lookup_path(Path::new("sounds/boom.WAV")).is_some());
        assert!(registry.lookup_path(Path::new("sounds/boom")).is_none());
        assert!(registry.lookup_path(Path::new("archive.tar.gz")).is_none());
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = FormatRegistry::with_defaults();
        registry.register("Refuser", "WAV", refuse);
        assert_eq!(registry.count(), 2);
        let entry = registry.lookup("wav").unwrap();
        assert_eq!(entry.name, "Refuser");
        assert_eq!(entry.extension, "wav");
    }
}
