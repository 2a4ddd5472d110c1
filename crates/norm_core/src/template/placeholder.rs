//! Bind-parameter placeholder styles and the process-wide default.
//!
//! # Invariants
//! - The default is set at most once; a conflicting second value is rejected.
//! - Reading the default before it is set yields `Placeholder::Numbered`.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static DEFAULT_PLACEHOLDER: OnceCell<Placeholder> = OnceCell::new();

/// How a compiled template spells its positional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    /// `?`
    Question,
    /// `?1`, `?2`, ...
    #[default]
    Numbered,
    /// `$1`, `$2`, ...
    Dollar,
    /// `:1`, `:2`, ...
    Colon,
    /// `@p1`, `@p2`, ...
    AtP,
}

impl Placeholder {
    /// Renders the placeholder for the 1-based parameter `index`.
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Question => "?".to_string(),
            Self::Numbered => format!("?{index}"),
            Self::Dollar => format!("${index}"),
            Self::Colon => format!(":{index}"),
            Self::AtP => format!("@p{index}"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Numbered => "numbered",
            Self::Dollar => "dollar",
            Self::Colon => "colon",
            Self::AtP => "at_p",
        }
    }
}

/// Sets the placeholder style adapters pick up at construction.
///
/// Must run before the first adapter is built. Repeating the same value is a
/// no-op; switching to a different value is rejected.
pub fn set_default_placeholder(placeholder: Placeholder) -> Result<(), String> {
    let active = DEFAULT_PLACEHOLDER.get_or_init(|| placeholder);
    if *active != placeholder {
        return Err(format!(
            "default placeholder already set to `{}`; refusing to switch to `{}`",
            active.as_str(),
            placeholder.as_str()
        ));
    }
    Ok(())
}

/// Returns the process-wide default placeholder style.
pub fn default_placeholder() -> Placeholder {
    DEFAULT_PLACEHOLDER.get().copied().unwrap_or_default()
}
