use application::ReceiptBuilder;
use domain::printer::{Alignment, PrintInstruction, TextOptions};

/// A simple text job assembled from command line flags
#[derive(Debug, Clone, Default)]
pub struct PrintJob {
    pub lines: Vec<String>,
    pub alignment: Alignment,
    pub options: TextOptions,
    pub barcode: Option<String>,
    pub feed: u8,
    pub cut: bool,
}

impl PrintJob {
    pub fn instructions(&self) -> Vec<PrintInstruction> {
        let mut builder = ReceiptBuilder::new()
            .initialize()
            .align(self.alignment)
            .options(self.options.clone());

        for line in &self.lines {
            builder = builder.text_line(line);
        }
        if let Some(data) = &self.barcode {
            builder = builder.barcode(data);
        }
        if self.feed > 0 {
            builder = builder.feed(self.feed);
        }
        if self.cut {
            builder = builder.cut();
        }
        builder.instructions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_job() {
        let job = PrintJob {
            lines: vec!["hello".to_string()],
            ..PrintJob::default()
        };

        assert_eq!(
            job.instructions(),
            vec![
                PrintInstruction::Init,
                PrintInstruction::Align {
                    alignment: Alignment::Left
                },
                PrintInstruction::Text {
                    text: "hello\n".to_string(),
                    options: TextOptions::default()
                },
            ]
        );
    }

    #[test]
    fn test_full_job_ends_with_cut() {
        let job = PrintJob {
            lines: vec!["a".to_string(), "b".to_string()],
            barcode: Some("123".to_string()),
            feed: 3,
            cut: true,
            ..PrintJob::default()
        };

        let instructions = job.instructions();
        assert_eq!(instructions.len(), 7);
        assert_eq!(instructions[5], PrintInstruction::Feed { lines: 3 });
        assert_eq!(instructions.last(), Some(&PrintInstruction::Cut));
    }
}
