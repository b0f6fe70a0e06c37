//! Invoice PDF rendering.
//!
//! Fixed A4 layout with vertical flow: header (issuer + document block),
//! bill-to, line-item table, totals, footer. Amounts are converted to the
//! display currency with the supplied rate; stored invoice amounts are never
//! touched. Rendering uses only invoice-provided dates, so identical inputs
//! produce an identical document body.

use crate::models::{Client, Invoice, Issuer};
use crate::services::totals::{compute_totals, convert, format_money_ascii};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point,
};
use rust_decimal::Decimal;
use service_core::error::AppError;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 18.0;
const RIGHT_EDGE: f32 = PAGE_W - MARGIN;
const BOTTOM: f32 = 22.0;

const COL_DESC: f32 = MARGIN;
const COL_QTY: f32 = 112.0;
const COL_RATE: f32 = 152.0;

fn text(layer: &PdfLayerReference, font: &IndirectFontRef, s: &str, size: f32, x: f32, y: f32) {
    layer.use_text(s, size, Mm(x), Mm(y), font);
}

fn text_right(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    s: &str,
    size: f32,
    x_right: f32,
    y: f32,
) {
    // printpdf exposes no text metrics for builtin fonts; a pragmatic
    // per-character estimate is good enough for numeric columns.
    let width_est = (s.chars().count() as f32) * size * 0.42;
    text(layer, font, s, size, (x_right - width_est).max(0.0), y);
}

fn rule(layer: &PdfLayerReference, x1: f32, x2: f32, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y)), false),
            (Point::new(Mm(x2), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn wrap_text(input: &str, max_chars: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in input.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Render an invoice into PDF bytes suitable for an HTTP response or an email
/// attachment.
pub fn render_invoice_pdf(
    invoice: &Invoice,
    client: &Client,
    issuer: &Issuer,
    display_currency: &str,
    rate: Decimal,
) -> Result<Vec<u8>, AppError> {
    let (doc, page1, layer1) = PdfDocument::new("Invoice", Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let mut layer = doc.get_page(page1).get_layer(layer1);

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::PdfError(anyhow::anyhow!("font: {}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::PdfError(anyhow::anyhow!("font: {}", e)))?;

    let money = |amount: Decimal| format_money_ascii(convert(amount, rate), display_currency);

    // --- Header ---
    let mut issuer_name_x = MARGIN;
    if let Some(bytes) = issuer.logo_png.as_deref() {
        // A broken logo must not fail the document; render without it.
        if let Ok(img) = printpdf::image_crate::load_from_memory(bytes) {
            let image = Image::from_dynamic_image(&img);
            // Natural size at the embed DPI, in mm.
            let natural_w_mm = image.image.width.0 as f32 * 25.4 / 300.0;
            let natural_h_mm = image.image.height.0 as f32 * 25.4 / 300.0;
            let scale = (16.0 / natural_h_mm.max(1.0)).min(16.0 / natural_w_mm.max(1.0));
            image.add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(MARGIN)),
                    translate_y: Some(Mm(PAGE_H - MARGIN - 16.0)),
                    rotate: None,
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(300.0),
                },
            );
            issuer_name_x = MARGIN + 20.0;
        }
    }

    let top = PAGE_H - MARGIN;
    text(&layer, &bold, issuer.display_name(), 18.0, issuer_name_x, top - 8.0);

    text_right(&layer, &bold, "INVOICE", 18.0, RIGHT_EDGE, top - 4.0);
    text_right(
        &layer,
        &font,
        &format!("Invoice #: {}", invoice.invoice_number),
        10.0,
        RIGHT_EDGE,
        top - 12.0,
    );
    text_right(
        &layer,
        &font,
        &format!("Date: {}", invoice.issue_date.format("%d %b %Y")),
        10.0,
        RIGHT_EDGE,
        top - 17.0,
    );
    text_right(
        &layer,
        &font,
        &format!("Due Date: {}", invoice.due_date.format("%d %b %Y")),
        10.0,
        RIGHT_EDGE,
        top - 22.0,
    );

    // --- Bill-to block ---
    let mut y = top - 38.0;
    text(&layer, &bold, "Bill To:", 11.0, MARGIN, y);
    y -= 6.0;
    text(&layer, &font, &client.name, 10.0, MARGIN, y);
    y -= 5.0;
    if let Some(address) = client.address.as_deref() {
        for line in wrap_text(address, 60) {
            text(&layer, &font, &line, 10.0, MARGIN, y);
            y -= 5.0;
        }
    }
    if let Some(email) = client.email.as_deref() {
        text(&layer, &font, email, 10.0, MARGIN, y);
        y -= 5.0;
    }

    // --- Line-item table ---
    y -= 8.0;
    text(&layer, &bold, "Description", 10.0, COL_DESC, y);
    text_right(&layer, &bold, "Quantity", 10.0, COL_QTY + 18.0, y);
    text_right(&layer, &bold, "Rate", 10.0, COL_RATE + 18.0, y);
    text_right(&layer, &bold, "Amount", 10.0, RIGHT_EDGE, y);
    y -= 2.0;
    rule(&layer, MARGIN, RIGHT_EDGE, y);
    y -= 6.0;

    for item in &invoice.items {
        let desc_lines = wrap_text(&item.description, 48);
        let row_height = 6.0 * desc_lines.len() as f32;

        if y - row_height < BOTTOM + 20.0 {
            // Content overflow: continue on a fresh page.
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            layer = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_H - MARGIN;
        }

        for (i, line) in desc_lines.iter().enumerate() {
            text(&layer, &font, line, 10.0, COL_DESC, y - 6.0 * i as f32);
        }
        text_right(
            &layer,
            &font,
            &item.quantity.normalize().to_string(),
            10.0,
            COL_QTY + 18.0,
            y,
        );
        text_right(&layer, &font, &money(item.rate), 10.0, COL_RATE + 18.0, y);
        text_right(
            &layer,
            &font,
            &money(item.quantity * item.rate),
            10.0,
            RIGHT_EDGE,
            y,
        );
        y -= row_height;
    }

    // --- Totals block ---
    let totals = compute_totals(&invoice.items, invoice.discount, invoice.extra_charges);
    y -= 2.0;
    rule(&layer, COL_QTY, RIGHT_EDGE, y);
    y -= 7.0;

    let totals_row = |label: &str, value: String, use_bold: bool, y: f32| {
        let f = if use_bold { &bold } else { &font };
        text(&layer, f, label, 10.0, COL_QTY, y);
        text_right(&layer, f, &value, if use_bold { 12.0 } else { 10.0 }, RIGHT_EDGE, y);
    };

    totals_row("Subtotal", money(totals.subtotal), false, y);
    y -= 6.0;
    totals_row("Tax", money(totals.tax_total), false, y);
    y -= 6.0;
    if invoice.discount > Decimal::ZERO {
        totals_row("Discount", format!("-{}", money(invoice.discount)), false, y);
        y -= 6.0;
    }
    if invoice.extra_charges > Decimal::ZERO {
        totals_row("Additional charges", money(invoice.extra_charges), false, y);
        y -= 6.0;
    }
    y -= 2.0;
    totals_row("Total", money(totals.total), true, y);
    y -= 12.0;

    // --- Notes and payment instructions (internal memo never rendered) ---
    if let Some(notes) = invoice.notes.as_deref().filter(|s| !s.trim().is_empty()) {
        text(&layer, &bold, "Notes", 10.0, MARGIN, y);
        y -= 5.0;
        for line in wrap_text(notes, 90) {
            text(&layer, &font, &line, 9.0, MARGIN, y);
            y -= 4.5;
        }
        y -= 4.0;
    }
    if let Some(instructions) = invoice
        .payment_instructions
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        text(&layer, &bold, "Payment Instructions", 10.0, MARGIN, y);
        y -= 5.0;
        for line in wrap_text(instructions, 90) {
            text(&layer, &font, &line, 9.0, MARGIN, y);
            y -= 4.5;
        }
    }

    // --- Footer ---
    text_right(
        &layer,
        &font,
        "Thank you for your business.",
        10.0,
        (PAGE_W + 30.0) / 2.0,
        12.0,
    );

    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| AppError::PdfError(anyhow::anyhow!("save: {}", e)))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::PdfError(anyhow::anyhow!("writer: {}", e)))?;
    Ok(bytes)
}
