/// Cheat code formats declared by the core.
///
/// The core decodes Game Genie text itself; the bridge only gates on the
/// declared kind so unsupported formats fail before any core call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheatKind {
    /// Six-letter Game Genie code.
    GameGenie6,
    /// Eight-letter Game Genie code.
    GameGenie8,
}

impl CheatKind {
    /// Number of code letters this format expects.
    pub const fn code_len(self) -> usize {
        match self {
            CheatKind::GameGenie6 => 6,
            CheatKind::GameGenie8 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CheatKind::GameGenie6 => "Game Genie (6)",
            CheatKind::GameGenie8 => "Game Genie (8)",
        }
    }
}

/// Cheat formats the NES core supports.
pub const SUPPORTED_CHEAT_KINDS: &[CheatKind] = &[CheatKind::GameGenie6, CheatKind::GameGenie8];
