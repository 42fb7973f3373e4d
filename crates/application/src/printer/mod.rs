pub mod builder;
pub mod codec;
mod escpos_printer;

pub use builder::ReceiptBuilder;
pub use escpos_printer::EscPosPrinter;
