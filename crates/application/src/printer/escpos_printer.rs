use tracing::debug;

use domain::printer::{Alignment, BarcodeOptions, PrintInstruction, TextOptions};
use domain::BluetoothError;

use super::codec;
use crate::session::SessionManager;

/// ESC/POS commands over the active printer session.
///
/// Each call is encoded up front and handed to the session as one payload,
/// so output from concurrent callers never interleaves.
#[derive(Clone)]
pub struct EscPosPrinter {
    session: SessionManager,
    default_options: TextOptions,
}

impl EscPosPrinter {
    pub fn new(session: SessionManager) -> Self {
        Self::with_default_options(session, TextOptions::default())
    }

    /// Options used by `print_line`
    pub fn with_default_options(session: SessionManager, default_options: TextOptions) -> Self {
        Self {
            session,
            default_options,
        }
    }

    pub fn default_options(&self) -> &TextOptions {
        &self.default_options
    }

    pub async fn printer_init(&self) -> Result<(), BluetoothError> {
        self.print(&[PrintInstruction::Init]).await
    }

    pub async fn printer_align(&self, alignment: Alignment) -> Result<(), BluetoothError> {
        self.print(&[PrintInstruction::Align { alignment }]).await
    }

    pub async fn print_text(&self, text: &str, options: &TextOptions) -> Result<(), BluetoothError> {
        self.print(&[PrintInstruction::Text {
            text: text.to_string(),
            options: options.clone(),
        }])
        .await
    }

    /// Text plus a line feed with the default options
    pub async fn print_line(&self, text: &str) -> Result<(), BluetoothError> {
        let line = format!("{text}\n");
        self.print_text(&line, &self.default_options).await
    }

    pub async fn feed(&self, lines: u8) -> Result<(), BluetoothError> {
        self.print(&[PrintInstruction::Feed { lines }]).await
    }

    pub async fn cut(&self) -> Result<(), BluetoothError> {
        self.print(&[PrintInstruction::Cut]).await
    }

    pub async fn print_barcode(
        &self,
        data: &str,
        options: &BarcodeOptions,
    ) -> Result<(), BluetoothError> {
        self.print(&[PrintInstruction::Barcode {
            data: data.to_string(),
            options: options.clone(),
        }])
        .await
    }

    /// Encode and send a whole job as one burst. Invalid instructions fail
    /// before anything is written.
    pub async fn print(&self, instructions: &[PrintInstruction]) -> Result<(), BluetoothError> {
        let payload = codec::encode_all(instructions)?;
        debug!(
            instructions = instructions.len(),
            bytes = payload.len(),
            "Sending print job"
        );
        self.session.send(payload).await
    }
}
