//! Font discovery and loading.

use fontdue::{Font, FontSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Bold faces, in order of preference.
const BOLD_FONT_PATHS: &[&str] = &[
    "/app/assets/fonts/Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
];

/// Regular faces, in order of preference.
const REGULAR_FONT_PATHS: &[&str] = &[
    "/app/assets/fonts/Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
];

/// First existing path among `candidates`.
fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Parse a font file.
pub fn load_font(path: &Path) -> MediaResult<Font> {
    let bytes = std::fs::read(path).map_err(|_| MediaError::FontNotFound(path.display().to_string()))?;
    Font::from_bytes(bytes, FontSettings::default()).map_err(|e| {
        MediaError::invalid_input(format!("failed to parse font {}: {}", path.display(), e))
    })
}

/// Regular and bold faces shared by every painter in a job.
#[derive(Clone)]
pub struct FontSet {
    regular: Arc<Font>,
    bold: Arc<Font>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet").finish_non_exhaustive()
    }
}

impl FontSet {
    /// Load fonts. An explicit path is used for both weights; otherwise the
    /// system candidates are searched.
    pub fn load(explicit: Option<&Path>) -> MediaResult<Self> {
        if let Some(path) = explicit {
            let font = Arc::new(load_font(path)?);
            return Ok(Self {
                regular: Arc::clone(&font),
                bold: font,
            });
        }

        let bold_path = first_existing(BOLD_FONT_PATHS);
        let regular_path = first_existing(REGULAR_FONT_PATHS);

        let (bold_path, regular_path) = match (bold_path, regular_path) {
            (Some(b), Some(r)) => (b, r),
            (Some(b), None) => (b.clone(), b),
            (None, Some(r)) => (r.clone(), r),
            (None, None) => {
                return Err(MediaError::FontNotFound(
                    [BOLD_FONT_PATHS, REGULAR_FONT_PATHS].concat().join(", "),
                ))
            }
        };
        debug!(bold = %bold_path.display(), regular = %regular_path.display(), "Loading fonts");

        Ok(Self {
            regular: Arc::new(load_font(&regular_path)?),
            bold: Arc::new(load_font(&bold_path)?),
        })
    }

    pub fn from_fonts(regular: Font, bold: Font) -> Self {
        Self {
            regular: Arc::new(regular),
            bold: Arc::new(bold),
        }
    }

    pub fn get(&self, bold: bool) -> &Font {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }
}

/// Font committed under `tests/fixtures`, so text tests never depend on
/// what the host has installed.
#[cfg(test)]
pub(crate) fn fixture_fonts() -> FontSet {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf");
    FontSet::load(Some(&path)).expect("fixture font must load")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_font_serves_both_weights() {
        let fonts = fixture_fonts();
        let regular = fonts.get(false).metrics('A', 32.0);
        let bold = fonts.get(true).metrics('A', 32.0);
        assert!(regular.width > 0);
        assert_eq!(regular.width, bold.width);
    }

    #[test]
    fn test_missing_explicit_font() {
        let err = FontSet::load(Some(Path::new("/nonexistent/font.ttf"))).unwrap_err();
        assert!(matches!(err, MediaError::FontNotFound(_)));
    }

    #[test]
    fn test_garbage_font_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(load_font(&path).is_err());
    }
}
