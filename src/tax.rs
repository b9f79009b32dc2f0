//! GST arithmetic over a [`Document`].
//!
//! Everything here is a pure derivation: nothing rounds, nothing mutates the
//! document. Rounding to whole rupees happens only in [`format_currency`].

use serde::Serialize;

use crate::model::{Document, LineItem, PricingMode, TaxSplit};

/// One displayed tax column: CGST/SGST halves or a single IGST figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxShare {
    pub label: &'static str,
    pub rate: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineBreakdown {
    pub id: String,
    pub base: f64,
    pub tax: f64,
    pub line_total: f64,
    pub shares: Vec<TaxShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub total_tax: f64,
    pub total_amount: f64,
    /// Aggregate shares. `rate` is the common item rate split per column,
    /// or zero when items mix rates.
    pub shares: Vec<TaxShare>,
    pub lines: Vec<LineBreakdown>,
}

impl TaxSplit {
    /// Column labels in display order.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            TaxSplit::Split => &["CGST", "SGST"],
            TaxSplit::Single => &["IGST"],
        }
    }

    /// Distributes a tax amount at `rate` over this split's columns.
    /// The split is a flat 50/50 for CGST/SGST.
    pub fn shares(self, rate: f64, tax: f64) -> Vec<TaxShare> {
        let labels = self.labels();
        let parts = labels.len() as f64;
        labels
            .iter()
            .map(|&label| TaxShare { label, rate: rate / parts, amount: tax / parts })
            .collect()
    }
}

/// Returns `(base, tax, line_total)` for one value at `rate` percent.
pub fn split_value(mode: PricingMode, value: f64, rate: f64) -> (f64, f64, f64) {
    match mode {
        PricingMode::Exclusive => {
            let tax = value * (rate / 100.0);
            (value, tax, value + tax)
        }
        PricingMode::Inclusive => {
            let base = value / (1.0 + rate / 100.0);
            (base, value - base, value)
        }
    }
}

fn line_breakdown(mode: PricingMode, split: TaxSplit, item: &LineItem) -> LineBreakdown {
    let (base, tax, line_total) = split_value(mode, item.value, item.tax_rate_percent);
    LineBreakdown {
        id: item.id.clone(),
        base,
        tax,
        line_total,
        shares: split.shares(item.tax_rate_percent, tax),
    }
}

/// Computes per-line and document totals.
///
/// The document-level figures are summed from raw item values per pricing
/// mode rather than from the per-line breakdowns.
pub fn compute_totals(doc: &Document) -> Totals {
    let mode = doc.pricing_mode;
    let lines: Vec<LineBreakdown> = doc
        .items
        .iter()
        .map(|item| line_breakdown(mode, doc.tax_split, item))
        .collect();

    let (subtotal, total_tax, total_amount) = match mode {
        PricingMode::Exclusive => {
            let subtotal: f64 = doc.items.iter().map(|i| i.value).sum();
            let total_tax: f64 = doc
                .items
                .iter()
                .map(|i| i.value * (i.tax_rate_percent / 100.0))
                .sum();
            (subtotal, total_tax, subtotal + total_tax)
        }
        PricingMode::Inclusive => {
            let total_amount: f64 = doc.items.iter().map(|i| i.value).sum();
            let subtotal: f64 = doc
                .items
                .iter()
                .map(|i| i.value / (1.0 + i.tax_rate_percent / 100.0))
                .sum();
            (subtotal, total_amount - subtotal, total_amount)
        }
    };

    let common_rate = match doc.items.split_first() {
        Some((first, rest)) if rest.iter().all(|i| i.tax_rate_percent == first.tax_rate_percent) => {
            first.tax_rate_percent
        }
        _ => 0.0,
    };

    Totals {
        subtotal,
        total_tax,
        total_amount,
        shares: doc.tax_split.shares(common_rate, total_tax),
        lines,
    }
}

/// Formats a rupee amount with Indian digit grouping (`1,18,000`),
/// truncated toward zero to whole units.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "-".to_string();
    }
    let whole = amount.trunc();
    let negative = whole < 0.0;
    let digits = format!("{:.0}", whole.abs());

    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut rest = head;
        while rest.len() > 2 {
            let (left, right) = rest.split_at(rest.len() - 2);
            groups.push(right);
            rest = left;
        }
        groups.push(rest);
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    if negative { format!("-{grouped}") } else { grouped }
}

/// Formats a percentage without trailing zeros: `18`, `9`, `2.5`.
pub fn format_rate(rate: f64) -> String {
    let text = format!("{rate:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}%")
}
