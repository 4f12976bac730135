/// Placeholder replaced by the zero-padded sequence.
pub const SEQUENCE_PLACEHOLDER: &str = "{0000}";

/// Render an invoice number from a tenant format and a sequence value.
///
/// `"FAC-{0000}"` with 7 gives `"FAC-0007"`; a format without the
/// placeholder gets the sequence appended: `"INV"` with 7 gives `"INV-0007"`.
pub fn format_invoice_number(format: &str, sequence: u64) -> String {
    let padded = format!("{sequence:04}");
    let format = format.trim();
    if format.contains(SEQUENCE_PLACEHOLDER) {
        format.replace(SEQUENCE_PLACEHOLDER, &padded)
    } else if format.is_empty() {
        padded
    } else {
        format!("{format}-{padded}")
    }
}
