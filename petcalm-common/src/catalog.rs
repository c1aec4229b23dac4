//! Sound catalog model
//!
//! Descriptors are immutable and catalog-defined. A descriptor either points
//! at an audio asset (`File`) or names a procedural generator (`Generated`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Duration value marking a loop with no natural end
pub const UNBOUNDED_DURATION_SECONDS: u32 = 9999;

/// URL prefix used by catalog JSON for generator-backed sounds
const GENERATE_PREFIX: &str = "generate:";

/// Procedural signal kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    White,
    Brown,
    Pink,
    Purr,
    Binaural,
}

impl GeneratorKind {
    /// Noise kinds loop a precomputed buffer; tone kinds run oscillators
    pub fn is_noise(&self) -> bool {
        matches!(
            self,
            GeneratorKind::White | GeneratorKind::Brown | GeneratorKind::Pink
        )
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorKind::White => write!(f, "white"),
            GeneratorKind::Brown => write!(f, "brown"),
            GeneratorKind::Pink => write!(f, "pink"),
            GeneratorKind::Purr => write!(f, "purr"),
            GeneratorKind::Binaural => write!(f, "binaural"),
        }
    }
}

impl std::str::FromStr for GeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(GeneratorKind::White),
            "brown" => Ok(GeneratorKind::Brown),
            "pink" => Ok(GeneratorKind::Pink),
            "purr" => Ok(GeneratorKind::Purr),
            "binaural" => Ok(GeneratorKind::Binaural),
            other => Err(Error::InvalidInput(format!(
                "Unknown generator kind: {}",
                other
            ))),
        }
    }
}

/// Where a sound's samples come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SoundSource {
    /// Audio asset served through the offline cache
    File { url: String },
    /// Synthesized on device, no asset required
    Generated { generator: GeneratorKind },
}

impl SoundSource {
    /// Parse the catalog URL convention (`generate:<kind>` or an asset path)
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("Empty sound URL".to_string()));
        }
        match url.strip_prefix(GENERATE_PREFIX) {
            Some(kind) => Ok(SoundSource::Generated {
                generator: kind.parse()?,
            }),
            None => Ok(SoundSource::File {
                url: url.to_string(),
            }),
        }
    }

    /// Inverse of `from_url`
    pub fn to_url(&self) -> String {
        match self {
            SoundSource::File { url } => url.clone(),
            SoundSource::Generated { generator } => format!("{}{}", GENERATE_PREFIX, generator),
        }
    }

    pub fn generator(&self) -> Option<GeneratorKind> {
        match self {
            SoundSource::Generated { generator } => Some(*generator),
            SoundSource::File { .. } => None,
        }
    }
}

/// Catalog grouping shown in the sound library
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SoundCategory {
    #[serde(rename = "White Noise")]
    WhiteNoise,
    Nature,
    Classical,
    Specialized,
}

/// Immutable, catalog-defined sound
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoundDescriptor {
    pub id: String,
    pub title: String,
    pub category: SoundCategory,
    /// Nominal length; `UNBOUNDED_DURATION_SECONDS` means loop forever
    pub duration_seconds: u32,
    pub is_premium: bool,
    /// Display color token, opaque to the engine
    pub color_tag: String,
    pub source: SoundSource,
}

impl SoundDescriptor {
    pub fn is_generated(&self) -> bool {
        matches!(self.source, SoundSource::Generated { .. })
    }

    pub fn is_unbounded(&self) -> bool {
        self.duration_seconds >= UNBOUNDED_DURATION_SECONDS
    }

    /// Asset URL for file-backed sounds
    pub fn asset_url(&self) -> Option<&str> {
        match &self.source {
            SoundSource::File { url } => Some(url),
            SoundSource::Generated { .. } => None,
        }
    }
}

/// Catalog JSON as shipped by the app (`url` carries the source convention)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogRecord {
    id: String,
    title: String,
    category: SoundCategory,
    duration: u32,
    #[serde(default)]
    is_premium: bool,
    #[serde(default)]
    color: String,
    url: String,
}

impl TryFrom<CatalogRecord> for SoundDescriptor {
    type Error = Error;

    fn try_from(record: CatalogRecord) -> Result<Self> {
        Ok(SoundDescriptor {
            source: SoundSource::from_url(&record.url)?,
            id: record.id,
            title: record.title,
            category: record.category,
            duration_seconds: record.duration,
            is_premium: record.is_premium,
            color_tag: record.color,
        })
    }
}

/// Ordered, read-only list of sound descriptors
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sounds: Vec<SoundDescriptor>,
}

impl Catalog {
    pub fn new(sounds: Vec<SoundDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for sound in &sounds {
            if !seen.insert(sound.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate sound id in catalog: {}",
                    sound.id
                )));
            }
        }
        Ok(Self { sounds })
    }

    /// Load a catalog from the app's JSON array format
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_str(json)?;
        let sounds = records
            .into_iter()
            .map(SoundDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::new(sounds)
    }

    /// Shipped sound library: bundled nature recordings plus generators
    pub fn builtin() -> Self {
        let file = |id: &str, title: &str, duration: u32, color: &str, url: &str| SoundDescriptor {
            id: id.to_string(),
            title: title.to_string(),
            category: SoundCategory::Nature,
            duration_seconds: duration,
            is_premium: false,
            color_tag: color.to_string(),
            source: SoundSource::File {
                url: url.to_string(),
            },
        };
        let generated = |id: &str,
                         title: &str,
                         category: SoundCategory,
                         premium: bool,
                         color: &str,
                         generator: GeneratorKind| SoundDescriptor {
            id: id.to_string(),
            title: title.to_string(),
            category,
            duration_seconds: UNBOUNDED_DURATION_SECONDS,
            is_premium: premium,
            color_tag: color.to_string(),
            source: SoundSource::Generated { generator },
        };

        Self {
            sounds: vec![
                file("1", "Gentle Rain", 1800, "bg-blue-100", "/sounds/gentle-rain.mp3"),
                file("4", "Forest Birds", 2400, "bg-emerald-100", "/sounds/forest-birds.mp3"),
                file("7", "Ocean Waves", 2400, "bg-cyan-100", "/sounds/ocean-waves.mp3"),
                file("8", "Creek Water", 3600, "bg-teal-100", "/sounds/creek-water.mp3"),
                generated("9", "Pure White Noise", SoundCategory::WhiteNoise, false, "bg-gray-100", GeneratorKind::White),
                generated("3", "Brown Noise (Deep)", SoundCategory::WhiteNoise, false, "bg-rose-100", GeneratorKind::Brown),
                generated("10", "Pink Noise (Soft)", SoundCategory::WhiteNoise, false, "bg-pink-100", GeneratorKind::Pink),
                generated("5", "Deep Sleep Frequencies", SoundCategory::Specialized, false, "bg-purple-100", GeneratorKind::Brown),
                generated("11", "Calming Purr", SoundCategory::Specialized, true, "bg-amber-100", GeneratorKind::Purr),
                generated("12", "Binaural Theta", SoundCategory::Specialized, true, "bg-indigo-100", GeneratorKind::Binaural),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&SoundDescriptor> {
        self.sounds.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[SoundDescriptor] {
        &self.sounds
    }

    pub fn by_category(&self, category: SoundCategory) -> impl Iterator<Item = &SoundDescriptor> {
        self.sounds.iter().filter(move |s| s.category == category)
    }

    /// Entries the platform can actually play
    ///
    /// Generator-backed entries are hidden when synthesis is unsupported.
    pub fn playable(&self, generation_supported: bool) -> impl Iterator<Item = &SoundDescriptor> {
        self.sounds
            .iter()
            .filter(move |s| generation_supported || !s.is_generated())
    }

    /// Asset URLs of every file-backed entry (cache manifest input)
    pub fn asset_urls(&self) -> Vec<String> {
        self.sounds
            .iter()
            .filter_map(|s| s.asset_url().map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_generator() {
        let source = SoundSource::from_url("generate:pink").unwrap();
        assert_eq!(
            source,
            SoundSource::Generated {
                generator: GeneratorKind::Pink
            }
        );
        assert_eq!(source.to_url(), "generate:pink");
    }

    #[test]
    fn test_from_url_file() {
        let source = SoundSource::from_url("/sounds/gentle-rain.mp3").unwrap();
        assert_eq!(source.generator(), None);
        assert_eq!(source.to_url(), "/sounds/gentle-rain.mp3");
    }

    #[test]
    fn test_from_url_rejects_unknown_generator() {
        assert!(matches!(
            SoundSource::from_url("generate:thunder"),
            Err(Error::InvalidInput(_))
        ));
        assert!(SoundSource::from_url("  ").is_err());
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.asset_urls().len(), 4);
        assert_eq!(catalog.get("5").unwrap().source.generator(), Some(GeneratorKind::Brown));
        assert!(catalog.get("12").unwrap().is_premium);
        assert_eq!(catalog.by_category(SoundCategory::WhiteNoise).count(), 3);
        assert!(catalog.get("9").unwrap().is_unbounded());
    }

    #[test]
    fn test_playable_hides_generators_when_unsupported() {
        let catalog = Catalog::builtin();
        let playable: Vec<_> = catalog.playable(false).collect();
        assert_eq!(playable.len(), 4);
        assert!(playable.iter().all(|s| !s.is_generated()));
        assert_eq!(catalog.playable(true).count(), catalog.len());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"id": "1", "title": "Gentle Rain", "category": "Nature", "duration": 1800,
             "isPremium": false, "color": "bg-blue-100", "url": "/sounds/gentle-rain.mp3"},
            {"id": "9", "title": "Pure White Noise", "category": "White Noise", "duration": 9999,
             "isPremium": false, "color": "bg-gray-100", "url": "generate:white"}
        ]"#;

        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("9").unwrap().category, SoundCategory::WhiteNoise);
        assert_eq!(
            catalog.get("1").unwrap().asset_url(),
            Some("/sounds/gentle-rain.mp3")
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"[
            {"id": "1", "title": "A", "category": "Nature", "duration": 10, "url": "/a.mp3"},
            {"id": "1", "title": "B", "category": "Nature", "duration": 10, "url": "/b.mp3"}
        ]"#;
        assert!(Catalog::from_json(json).is_err());
    }
}
