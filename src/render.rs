//! Rendering: the Typst page surface that gets printed, and the terminal preview.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use serde::Serialize;
use tera::{Context, Tera, Value};
use tracing::debug;

use crate::error::ExportError;
use crate::export::output_name;
use crate::model::{BankDetails, Document, Party};
use crate::tax::{compute_totals, format_currency, format_rate, Totals};

// built-in page template
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.typ.tera");
const TEMPLATE_NAME: &str = "invoice.typ";

pub const PAGE_WIDTH_MM: u32 = 210;
pub const PAGE_HEIGHT_MM: u32 = 297;

/// The rendered page, as Typst markup. Image references appear as
/// `image("<src>"` and are what the export pipeline inlines.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub markup: String,
}

#[derive(Serialize)]
struct PageView {
    width_mm: u32,
    height_mm: u32,
}

#[derive(Serialize)]
struct ShareView {
    rate: String,
    amount: String,
}

#[derive(Serialize)]
struct RowView {
    description: String,
    value: String,
    hsn: String,
    shares: Vec<ShareView>,
    total: String,
}

#[derive(Serialize)]
struct TotalsView {
    subtotal: String,
    shares: Vec<String>,
    total: String,
}

#[derive(Serialize)]
struct SurfaceContext<'a> {
    pdf_title: String,
    page: PageView,
    columns: String,
    logo: Option<&'a str>,
    no_logo: bool,
    title: Option<&'a str>,
    date: Option<&'a str>,
    invoice_no: Option<&'a str>,
    billed_to: Option<&'a Party>,
    from: Option<&'a Party>,
    tax_labels: &'static [&'static str],
    rows: Vec<RowView>,
    totals: TotalsView,
    payment_note: Option<&'a str>,
    bank: Option<&'a BankDetails>,
    registration_id: Option<&'a str>,
}

/// Quotes `text` as a Typst string literal.
pub fn typst_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`typst_string`] for the body between the quotes.
pub fn unescape_typst(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn typst_str_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(typst_string(&text)))
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Uses `<template_dir>/invoice.typ.tera` when it exists, the built-in
    /// template otherwise.
    pub fn new(template_dir: Option<&Path>) -> Result<Self, ExportError> {
        let source = match template_dir.map(|dir| dir.join("invoice.typ.tera")) {
            Some(path) if path.exists() => {
                debug!("using template {:?}", path);
                fs::read_to_string(&path)?
            }
            _ => DEFAULT_TEMPLATE.to_string(),
        };

        let mut tera = Tera::default();
        tera.register_filter("typst_str", typst_str_filter);
        tera.add_raw_template(TEMPLATE_NAME, &source)?;
        Ok(Self { tera })
    }

    pub fn render(&self, doc: &Document) -> Result<Surface, ExportError> {
        let totals = compute_totals(doc);
        let context = Context::from_serialize(surface_context(doc, &totals))?;
        let markup = self.tera.render(TEMPLATE_NAME, &context)?;
        Ok(Surface { markup })
    }
}

fn shown<'a>(flag: bool, text: &'a str) -> Option<&'a str> {
    flag.then_some(text)
}

fn surface_context<'a>(doc: &'a Document, totals: &Totals) -> SurfaceContext<'a> {
    let vis = &doc.visibility;
    let labels = doc.tax_split.labels();

    let rows = doc
        .items
        .iter()
        .zip(&totals.lines)
        .map(|(item, line)| RowView {
            description: item.description.clone(),
            value: format_currency(line.base),
            hsn: item.hsn_code.clone(),
            shares: line
                .shares
                .iter()
                .map(|s| ShareView { rate: format_rate(s.rate), amount: format_currency(s.amount) })
                .collect(),
            total: format_currency(line.line_total),
        })
        .collect();

    // product, value, hsn, tax columns, amount
    let tax_width = 22 / labels.len();
    let mut columns = vec!["34%".to_string(), "14%".to_string(), "10%".to_string()];
    columns.extend(labels.iter().map(|_| format!("{tax_width}%")));
    columns.push("20%".to_string());

    SurfaceContext {
        pdf_title: output_name(doc),
        page: PageView { width_mm: PAGE_WIDTH_MM, height_mm: PAGE_HEIGHT_MM },
        columns: columns.join(", "),
        logo: (vis.logo && !doc.logo_url.is_empty()).then_some(doc.logo_url.as_str()),
        no_logo: vis.logo && doc.logo_url.is_empty(),
        title: shown(vis.title, &doc.title),
        date: shown(vis.date, &doc.date),
        invoice_no: shown(doc.shows_invoice_no(), &doc.invoice_no),
        billed_to: vis.billed_to.then_some(&doc.billed_to),
        from: vis.from.then_some(&doc.from),
        tax_labels: labels,
        rows,
        totals: TotalsView {
            subtotal: format_currency(totals.subtotal),
            shares: totals.shares.iter().map(|s| format_currency(s.amount)).collect(),
            total: format_currency(totals.total_amount),
        },
        payment_note: shown(vis.payment_note, &doc.payment_note),
        bank: vis.bank.then_some(&doc.bank),
        registration_id: shown(vis.registration_id, &doc.registration_id),
    }
}

// ==========================================
// Terminal preview
// ==========================================

/// A plain-text rendition of the page for the terminal.
pub fn preview(doc: &Document) -> String {
    let totals = compute_totals(doc);
    let vis = &doc.visibility;
    let mut out = String::new();

    if vis.logo {
        if doc.logo_url.is_empty() {
            out.push_str("[No Logo]\n");
        } else {
            out.push_str(&format!("[Logo: {}]\n", doc.logo_url));
        }
    }
    if vis.title {
        out.push_str(&format!("{}\n", doc.title.to_uppercase()));
    }
    if vis.date {
        out.push_str(&format!("Date: {}\n", doc.date));
    }
    if doc.shows_invoice_no() {
        out.push_str(&format!("Invoice no: {}\n", doc.invoice_no));
    }

    let mut parties = Table::new();
    parties.set_header(vec![
        Cell::new(if vis.billed_to { "Billed to:" } else { "" }),
        Cell::new(if vis.from { "From:" } else { "" }),
    ]);
    let party_text = |party: &Party, shown: bool| {
        if shown {
            format!("{}\n{}\nGST - {}", party.name, party.address, party.tax_id)
        } else {
            String::new()
        }
    };
    parties.add_row(vec![party_text(&doc.billed_to, vis.billed_to), party_text(&doc.from, vis.from)]);
    out.push_str(&format!("{parties}\n"));

    out.push_str(&format!("{}\n", item_table(doc, &totals)));

    if vis.payment_note {
        out.push_str(&format!("Payment method: {}\n", doc.payment_note));
    }
    if vis.bank {
        let bank = &doc.bank;
        out.push_str(&format!(
            "Account name - {}\nBank - {}\nA/c no. - {}\nIFSC - {}\nA/c type - {}\n",
            bank.account_name, bank.bank_name, bank.account_no, bank.ifsc, bank.account_type
        ));
    }
    if vis.registration_id {
        out.push_str(&format!("{}\n", doc.registration_id));
    }
    out
}

fn item_table(doc: &Document, totals: &Totals) -> Table {
    let labels = doc.tax_split.labels();
    let mut table = Table::new();

    let mut header = vec![Cell::new("ID"), Cell::new("Product"), Cell::new("Value"), Cell::new("HSN")];
    header.extend(labels.iter().map(|l| Cell::new(l)));
    header.push(Cell::new("Amount"));
    table.set_header(header);

    for (item, line) in doc.items.iter().zip(&totals.lines) {
        let mut row = vec![
            Cell::new(&item.id).fg(Color::DarkGrey),
            Cell::new(&item.description),
            Cell::new(format_currency(line.base)).set_alignment(CellAlignment::Right),
            Cell::new(&item.hsn_code),
        ];
        row.extend(line.shares.iter().map(|s| {
            Cell::new(format!("{} {}", format_rate(s.rate), format_currency(s.amount)))
                .set_alignment(CellAlignment::Right)
        }));
        row.push(Cell::new(format_currency(line.line_total)).set_alignment(CellAlignment::Right));
        table.add_row(row);
    }

    let mut total_row = vec![
        Cell::new(""),
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(format_currency(totals.subtotal)).add_attribute(Attribute::Bold),
        Cell::new(""),
    ];
    total_row.extend(
        totals
            .shares
            .iter()
            .map(|s| Cell::new(format_currency(s.amount)).add_attribute(Attribute::Bold)),
    );
    total_row.push(
        Cell::new(format_currency(totals.total_amount))
            .add_attribute(Attribute::Bold)
            .fg(Color::Rgb { r: 4, g: 120, b: 87 }),
    );
    table.add_row(total_row);
    table
}
