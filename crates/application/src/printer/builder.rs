use domain::DomainError;
use domain::printer::{Alignment, BarcodeOptions, PrintInstruction, TextOptions};

use super::codec;

const LINE_WIDTH: usize = 32;

/// Fluent composition of a receipt as print instructions.
///
/// Text lines inherit the builder's current text options; switch them with
/// `options`.
pub struct ReceiptBuilder {
    instructions: Vec<PrintInstruction>,
    options: TextOptions,
}

impl ReceiptBuilder {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            options: TextOptions::default(),
        }
    }

    pub fn initialize(mut self) -> Self {
        self.instructions.push(PrintInstruction::Init);
        self
    }

    pub fn options(mut self, options: TextOptions) -> Self {
        self.options = options;
        self
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        self.instructions.push(PrintInstruction::Align { alignment });
        self
    }

    pub fn align_center(self) -> Self {
        self.align(Alignment::Center)
    }

    pub fn align_left(self) -> Self {
        self.align(Alignment::Left)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.instructions.push(PrintInstruction::Text {
            text: text.to_string(),
            options: self.options.clone(),
        });
        self
    }

    pub fn text_line(self, text: &str) -> Self {
        self.text(&format!("{text}\n"))
    }

    pub fn empty_line(self) -> Self {
        self.text("\n")
    }

    pub fn separator(self) -> Self {
        self.text_line(&"-".repeat(LINE_WIDTH))
    }

    pub fn kv(self, key: &str, value: &str) -> Self {
        // "Key:           Value"
        let line = format!("{:<12}: {}", key, value);
        self.text_line(&line)
    }

    pub fn barcode(mut self, data: &str) -> Self {
        self.instructions.push(PrintInstruction::Barcode {
            data: data.to_string(),
            options: BarcodeOptions::default(),
        });
        self
    }

    pub fn feed(mut self, lines: u8) -> Self {
        self.instructions.push(PrintInstruction::Feed { lines });
        self
    }

    pub fn cut(mut self) -> Self {
        self.instructions.push(PrintInstruction::Cut);
        self
    }

    pub fn instructions(self) -> Vec<PrintInstruction> {
        self.instructions
    }

    pub fn build(self) -> Result<Vec<u8>, DomainError> {
        codec::encode_all(&self.instructions)
    }
}

impl Default for ReceiptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
