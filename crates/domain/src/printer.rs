use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

pub const MAX_MULTIPLIER: u8 = 8;
pub const MAX_FONT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Parameter byte for `ESC a n`
    pub fn code(&self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

impl std::str::FromStr for Alignment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" | "centre" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(DomainError::InvalidInstruction(format!(
                "Unknown alignment: {other}"
            ))),
        }
    }
}

/// Character set used to turn text into printer bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Simplified Chinese
    Gbk,
    /// Western European
    Cp1252,
    /// Arabic
    Cp1256,
    ShiftJis,
    EucKr,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Gbk => "GBK",
            Self::Cp1252 => "Cp1252",
            Self::Cp1256 => "Cp1256",
            Self::ShiftJis => "Shift_JIS",
            Self::EucKr => "EUC-KR",
        }
    }

    pub fn available() -> &'static [Self] {
        &[
            Self::Utf8,
            Self::Gbk,
            Self::Cp1252,
            Self::Cp1256,
            Self::ShiftJis,
            Self::EucKr,
        ]
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = DomainError;

    /// Case-insensitive; accepts the names printers and Java charsets use
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "gbk" | "gb2312" | "cp936" => Ok(Self::Gbk),
            "cp1252" | "windows-1252" => Ok(Self::Cp1252),
            "cp1256" | "windows-1256" => Ok(Self::Cp1256),
            "shift_jis" | "shift-jis" | "sjis" => Ok(Self::ShiftJis),
            "euc-kr" | "euckr" => Ok(Self::EucKr),
            _ => Err(DomainError::UnknownEncoding(s.to_string())),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call text formatting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Character width multiplier, 1..=8
    pub width: u8,
    /// Character height multiplier, 1..=8
    pub height: u8,
    /// Font selector (`ESC M n`), 0..=2
    pub font: u8,
    pub encoding: TextEncoding,
    /// Printer code table (`ESC t n`); left untouched when None
    pub codepage: Option<u8>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            font: 0,
            encoding: TextEncoding::default(),
            codepage: None,
        }
    }
}

impl TextOptions {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(1..=MAX_MULTIPLIER).contains(&value) {
                return Err(DomainError::InvalidTextOptions(format!(
                    "{name} multiplier {value} out of range 1..={MAX_MULTIPLIER}"
                )));
            }
        }
        if self.font > MAX_FONT {
            return Err(DomainError::InvalidTextOptions(format!(
                "font {} out of range 0..={MAX_FONT}",
                self.font
            )));
        }
        Ok(())
    }

    pub fn with_size(mut self, width: u8, height: u8) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeOptions {
    /// Bar height in dots, 1..=255
    pub height: u8,
    /// Module width, 2..=6
    pub module_width: u8,
}

impl Default for BarcodeOptions {
    fn default() -> Self {
        Self {
            height: 80,
            module_width: 2,
        }
    }
}

/// One structured print step, turned into bytes by the command codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PrintInstruction {
    Init,
    Align { alignment: Alignment },
    Text { text: String, options: TextOptions },
    Feed { lines: u8 },
    Barcode { data: String, options: BarcodeOptions },
    Cut,
}
