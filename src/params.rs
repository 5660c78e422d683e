//! Parameter translation between card news options and provider-specific formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Card aspect ratio.
///
/// Deserialization is lenient: anything unrecognized becomes `1:1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AspectRatio {
    /// `1:1`
    #[default]
    Square,
    /// `9:16`
    Portrait,
    /// `16:9`
    Landscape,
}

impl AspectRatio {
    /// The ratio token (`"1:1"`, `"9:16"`, `"16:9"`), as Imagen expects it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
        }
    }

    /// Map any ratio string onto a supported ratio, defaulting to `1:1`.
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Explicit pixel dimensions for providers that take width and height.
    #[must_use]
    pub fn pixel_dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (1024, 1024),
            Self::Portrait => (720, 1280),
            Self::Landscape => (1280, 720),
        }
    }

    /// DALL-E 3 size string.
    #[must_use]
    pub fn dalle_size(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }

    /// Composition hint for models that only take the ratio through the prompt.
    #[must_use]
    pub fn composition_hint(self) -> &'static str {
        match self {
            Self::Square => "square 1:1 composition",
            Self::Portrait => "vertical 9:16 portrait composition",
            Self::Landscape => "wide 16:9 landscape composition",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" => Ok(Self::Square),
            "9:16" => Ok(Self::Portrait),
            "16:9" => Ok(Self::Landscape),
            other => Err(format!("Unsupported aspect ratio '{other}'. Valid: 1:1, 9:16, 16:9")),
        }
    }
}

impl From<String> for AspectRatio {
    fn from(value: String) -> Self {
        Self::normalize(&value)
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resolution {
    /// Provider default quality.
    #[default]
    TwoK,
    /// High resolution: quality keywords or doubled dimensions.
    FourK,
}

const FOUR_K_KEYWORDS: &str = "(4k, high resolution:1.5, ultra detailed, sharp focus, crystal clear)";

impl Resolution {
    /// `"2k"` or `"4k"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TwoK => "2k",
            Self::FourK => "4k",
        }
    }

    /// Append quality keywords for providers without a resolution parameter.
    #[must_use]
    pub fn enhance_prompt(self, prompt: &str) -> String {
        match self {
            Self::TwoK => prompt.to_string(),
            Self::FourK => format!("{prompt}, {FOUR_K_KEYWORDS}"),
        }
    }

    /// Scale pixel dimensions for providers that take width and height.
    #[must_use]
    pub fn scale(self, (width, height): (u32, u32)) -> (u32, u32) {
        match self {
            Self::TwoK => (width, height),
            Self::FourK => (width * 2, height * 2),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2k" => Ok(Self::TwoK),
            "4k" => Ok(Self::FourK),
            other => Err(format!("Unsupported resolution '{other}'. Valid: 2k, 4k")),
        }
    }
}

impl From<String> for Resolution {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual style forced into every image prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtStyle {
    /// Flat vector infographic in pastel colors.
    #[default]
    ModernMinimal,
    /// Hand-painted watercolor.
    Watercolor,
    /// Soft 3D render.
    Render3d,
    /// Editorial illustration.
    Illustration,
    /// Photorealistic.
    Realistic,
}

impl ArtStyle {
    /// Every style, in picker order.
    pub const ALL: [Self; 5] =
        [Self::ModernMinimal, Self::Watercolor, Self::Render3d, Self::Illustration, Self::Realistic];

    /// Style identifier used in config and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModernMinimal => "modern-minimal",
            Self::Watercolor => "watercolor",
            Self::Render3d => "3d-render",
            Self::Illustration => "illustration",
            Self::Realistic => "realistic",
        }
    }

    /// Keywords every image prompt of this style must contain.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::ModernMinimal => &[
                "Modern Minimalist Vector Art style",
                "Flat Design Infographic",
                "Soft pastel colors with clean background",
                "No text or letters",
                "Simple illustration",
            ],
            Self::Watercolor => &[
                "Soft watercolor painting style",
                "Hand-painted texture with gentle color bleeds",
                "Light paper background",
                "No text or letters",
                "Simple composition",
            ],
            Self::Render3d => &[
                "Clean 3D render style",
                "Soft studio lighting",
                "Smooth matte materials in pastel colors",
                "No text or letters",
                "Simple composition",
            ],
            Self::Illustration => &[
                "Friendly editorial illustration style",
                "Bold outlines with flat colors",
                "Clean background",
                "No text or letters",
                "Simple illustration",
            ],
            Self::Realistic => &[
                "Photorealistic style",
                "Natural lighting and realistic textures",
                "Clean uncluttered background",
                "No text or letters",
                "Simple composition",
            ],
        }
    }
}

impl FromStr for ArtStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL.into_iter().find(|style| style.as_str() == s).ok_or_else(|| {
            let valid: Vec<&str> = Self::ALL.iter().map(|style| style.as_str()).collect();
            format!("Unsupported art style '{s}'. Valid: {}", valid.join(", "))
        })
    }
}

impl From<String> for ArtStyle {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<ArtStyle> for String {
    fn from(value: ArtStyle) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a reference image conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// Colors, texture and rendering technique.
    #[default]
    Style,
    /// The recurring character or subject.
    Character,
    /// Layout and framing.
    Composition,
}

impl ReferenceMode {
    /// Instruction sent alongside the reference images.
    #[must_use]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Style => {
                "Use the attached reference image(s) as a style reference: match their colors, \
                 texture and rendering technique."
            }
            Self::Character => {
                "Use the attached reference image(s) as a character reference: keep the same \
                 character or subject, with consistent appearance."
            }
            Self::Composition => {
                "Use the attached reference image(s) as a composition reference: follow their \
                 layout and framing."
            }
        }
    }
}

impl FromStr for ReferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "style" => Ok(Self::Style),
            "character" => Ok(Self::Character),
            "composition" => Ok(Self::Composition),
            other => Err(format!(
                "Unsupported reference mode '{other}'. Valid: style, character, composition"
            )),
        }
    }
}
