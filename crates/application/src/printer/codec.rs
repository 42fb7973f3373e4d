//! ESC/POS byte encoding for structured print instructions

use encoding_rs::{EncoderResult, Encoding};

use domain::printer::{Alignment, BarcodeOptions, PrintInstruction, TextEncoding, TextOptions};
use domain::DomainError;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// `GS k` system selector for CODE128
const CODE128: u8 = 73;
const BARCODE_MAX_DATA: usize = 253;

pub fn encode(instruction: &PrintInstruction) -> Result<Vec<u8>, DomainError> {
    let mut out = Vec::new();
    encode_into(instruction, &mut out)?;
    Ok(out)
}

/// Encode a whole job into one buffer; nothing is returned if any step is invalid
pub fn encode_all(instructions: &[PrintInstruction]) -> Result<Vec<u8>, DomainError> {
    let mut out = Vec::new();
    for instruction in instructions {
        encode_into(instruction, &mut out)?;
    }
    Ok(out)
}

fn encode_into(instruction: &PrintInstruction, out: &mut Vec<u8>) -> Result<(), DomainError> {
    match instruction {
        PrintInstruction::Init => out.extend_from_slice(&[ESC, b'@']),
        PrintInstruction::Align { alignment } => align(*alignment, out),
        PrintInstruction::Text { text, options } => text_block(text, options, out)?,
        PrintInstruction::Feed { lines } => out.extend_from_slice(&[ESC, b'd', *lines]),
        PrintInstruction::Barcode { data, options } => barcode(data, options, out)?,
        PrintInstruction::Cut => out.extend_from_slice(&[GS, b'V', 66, 0]),
    }
    Ok(())
}

fn align(alignment: Alignment, out: &mut Vec<u8>) {
    out.extend_from_slice(&[ESC, b'a', alignment.code()]);
}

fn text_block(text: &str, options: &TextOptions, out: &mut Vec<u8>) -> Result<(), DomainError> {
    options.validate()?;

    if let Some(codepage) = options.codepage {
        out.extend_from_slice(&[ESC, b't', codepage]);
    }
    out.extend_from_slice(&[ESC, b'M', options.font]);
    let size = ((options.width - 1) << 4) | (options.height - 1);
    out.extend_from_slice(&[GS, b'!', size]);
    out.extend(encode_text(text, options.encoding));
    Ok(())
}

fn barcode(data: &str, options: &BarcodeOptions, out: &mut Vec<u8>) -> Result<(), DomainError> {
    if data.is_empty() || data.len() > BARCODE_MAX_DATA || !data.is_ascii() {
        return Err(DomainError::InvalidInstruction(format!(
            "CODE128 data must be 1..={BARCODE_MAX_DATA} ASCII characters"
        )));
    }
    if options.height == 0 || !(2..=6).contains(&options.module_width) {
        return Err(DomainError::InvalidInstruction(format!(
            "barcode height {} / module width {} out of range",
            options.height, options.module_width
        )));
    }

    out.extend_from_slice(&[GS, b'h', options.height]);
    out.extend_from_slice(&[GS, b'w', options.module_width]);
    // code set B prefix counts toward the length byte
    out.extend_from_slice(&[GS, b'k', CODE128, (data.len() + 2) as u8, b'{', b'B']);
    out.extend_from_slice(data.as_bytes());
    Ok(())
}

fn codec_for(encoding: TextEncoding) -> Option<&'static Encoding> {
    match encoding {
        TextEncoding::Utf8 => None,
        TextEncoding::Gbk => Some(encoding_rs::GBK),
        TextEncoding::Cp1252 => Some(encoding_rs::WINDOWS_1252),
        TextEncoding::Cp1256 => Some(encoding_rs::WINDOWS_1256),
        TextEncoding::ShiftJis => Some(encoding_rs::SHIFT_JIS),
        TextEncoding::EucKr => Some(encoding_rs::EUC_KR),
    }
}

/// Encode `text` in the printer's character set. Characters the set cannot
/// represent become `?`.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Vec<u8> {
    let Some(codec) = codec_for(encoding) else {
        return text.as_bytes().to_vec();
    };

    let mut encoder = codec.new_encoder();
    let mut out = Vec::with_capacity(text.len() * 2);
    let mut input = text;
    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(input, &mut out, true);
        input = &input[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::Unmappable(_) => out.push(b'?'),
            EncoderResult::OutputFull => out.reserve(input.len() * 2 + 16),
        }
    }
    out
}
