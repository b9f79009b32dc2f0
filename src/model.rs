use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub const PROFORMA_TITLE: &str = "PROFORMA INVOICE";
pub const TAX_TITLE: &str = "TAX INVOICE";
pub const DEFAULT_LOGO: &str = "/creo-logo.png";

/// Whether a line value is entered before tax or already contains it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PricingMode {
    #[default]
    Exclusive,
    Inclusive,
}

/// How the tax figure is presented: CGST + SGST halves, or one IGST figure.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaxSplit {
    #[default]
    Split,
    Single,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    #[default]
    Proforma,
    Tax,
}

impl DocumentType {
    pub fn title(self) -> &'static str {
        match self {
            DocumentType::Proforma => PROFORMA_TITLE,
            DocumentType::Tax => TAX_TITLE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Party {
    pub name: String,
    pub address: String, // multi-line
    pub tax_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub value: f64,
    #[serde(rename = "hsn")]
    pub hsn_code: String,
    #[serde(rename = "gstRate")]
    pub tax_rate_percent: f64,
}

/// Item values and rates are finite and never negative.
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

impl LineItem {
    /// A fresh placeholder row, as added from the editor.
    pub fn blank(id: String) -> Self {
        Self {
            id,
            description: "New Service".to_string(),
            value: 0.0,
            hsn_code: String::new(),
            tax_rate_percent: 18.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct BankDetails {
    pub account_name: String,
    pub bank_name: String,
    pub account_no: String,
    pub ifsc: String,
    pub account_type: String,
}

/// Display toggles for the optional blocks. Rendering only.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub logo: bool,
    pub title: bool,
    pub date: bool,
    pub invoice_no: bool,
    pub billed_to: bool,
    pub from: bool,
    #[serde(rename = "bankDetails")]
    pub bank: bool,
    #[serde(rename = "udyam")]
    pub registration_id: bool,
    #[serde(rename = "paymentMethod")]
    pub payment_note: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            logo: true,
            title: true,
            date: true,
            invoice_no: true,
            billed_to: true,
            from: true,
            bank: true,
            registration_id: true,
            payment_note: true,
        }
    }
}

/// Names of the optional blocks, as used by `--show`/`--hide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Block {
    Logo,
    Title,
    Date,
    InvoiceNo,
    BilledTo,
    From,
    Bank,
    RegistrationId,
    PaymentNote,
}

impl Visibility {
    pub fn get(&self, block: Block) -> bool {
        match block {
            Block::Logo => self.logo,
            Block::Title => self.title,
            Block::Date => self.date,
            Block::InvoiceNo => self.invoice_no,
            Block::BilledTo => self.billed_to,
            Block::From => self.from,
            Block::Bank => self.bank,
            Block::RegistrationId => self.registration_id,
            Block::PaymentNote => self.payment_note,
        }
    }

    pub fn with(mut self, block: Block, shown: bool) -> Self {
        let slot = match block {
            Block::Logo => &mut self.logo,
            Block::Title => &mut self.title,
            Block::Date => &mut self.date,
            Block::InvoiceNo => &mut self.invoice_no,
            Block::BilledTo => &mut self.billed_to,
            Block::From => &mut self.from,
            Block::Bank => &mut self.bank,
            Block::RegistrationId => &mut self.registration_id,
            Block::PaymentNote => &mut self.payment_note,
        };
        *slot = shown;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Document {
    pub logo_url: String,
    pub title: String,
    pub date: String,
    pub invoice_no: String,
    pub pricing_mode: PricingMode,
    pub tax_split: TaxSplit,
    pub billed_to: Party,
    pub from: Party,
    pub items: Vec<LineItem>,
    pub bank: BankDetails,
    pub registration_id: String,
    pub payment_note: String,
    pub document_type: DocumentType,
    pub visibility: Visibility,
}

/// Today's date in the long display form, e.g. `16 October 2026`.
pub fn today_label() -> String {
    Local::now().date_naive().format("%d %B %Y").to_string()
}

impl Default for Document {
    fn default() -> Self {
        Self {
            logo_url: DEFAULT_LOGO.to_string(),
            title: PROFORMA_TITLE.to_string(),
            date: today_label(),
            invoice_no: "CE/00/25-26".to_string(),
            pricing_mode: PricingMode::Exclusive,
            tax_split: TaxSplit::Split,
            billed_to: Party {
                name: "Trupsel".to_string(),
                address: "93. D.Dalamal Park,\nCuffe Parade,\nMumbai 400005".to_string(),
                tax_id: "27AKIPB8270H1Z3".to_string(),
            },
            from: Party {
                name: "CREO Elements LLP".to_string(),
                address: "Office no 10, Mulchand Mansion,\nOld Hanuman Lane, Princess\nStreet, Mumbai - 400002".to_string(),
                tax_id: "27AARFC8016B1ZJ".to_string(),
            },
            items: default_items(),
            bank: BankDetails {
                account_name: "CREO ELEMENTS LLP".to_string(),
                bank_name: "HDFC Bank Ltd.".to_string(),
                account_no: "50200071934304".to_string(),
                ifsc: "HDFC0000080".to_string(),
                account_type: "Current Account".to_string(),
            },
            registration_id: "UDYAM-MH-19-0215995".to_string(),
            payment_note: "100% advance".to_string(),
            document_type: DocumentType::Proforma,
            // proforma documents never show an invoice number
            visibility: Visibility { invoice_no: false, ..Visibility::default() },
        }
    }
}

pub fn default_items() -> Vec<LineItem> {
    vec![LineItem {
        id: "1".to_string(),
        description: "Website maintenance charges".to_string(),
        value: 10000.0,
        hsn_code: "998315".to_string(),
        tax_rate_percent: 18.0,
    }]
}

// ==========================================
// Typed setters
// ==========================================
//
// Every setter leaves `self` untouched and returns the edited copy.

impl Document {
    pub fn with_logo_url(&self, logo_url: impl Into<String>) -> Self {
        Self { logo_url: logo_url.into(), ..self.clone() }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self { title: title.into(), ..self.clone() }
    }

    pub fn with_date(&self, date: impl Into<String>) -> Self {
        Self { date: date.into(), ..self.clone() }
    }

    pub fn with_invoice_no(&self, invoice_no: impl Into<String>) -> Self {
        Self { invoice_no: invoice_no.into(), ..self.clone() }
    }

    pub fn with_pricing_mode(&self, pricing_mode: PricingMode) -> Self {
        Self { pricing_mode, ..self.clone() }
    }

    pub fn with_tax_split(&self, tax_split: TaxSplit) -> Self {
        Self { tax_split, ..self.clone() }
    }

    pub fn with_billed_to(&self, billed_to: Party) -> Self {
        Self { billed_to, ..self.clone() }
    }

    pub fn with_from(&self, from: Party) -> Self {
        Self { from, ..self.clone() }
    }

    pub fn with_bank(&self, bank: BankDetails) -> Self {
        Self { bank, ..self.clone() }
    }

    pub fn with_registration_id(&self, registration_id: impl Into<String>) -> Self {
        Self { registration_id: registration_id.into(), ..self.clone() }
    }

    pub fn with_payment_note(&self, payment_note: impl Into<String>) -> Self {
        Self { payment_note: payment_note.into(), ..self.clone() }
    }

    pub fn with_visibility(&self, block: Block, shown: bool) -> Self {
        Self { visibility: self.visibility.with(block, shown), ..self.clone() }
    }

    /// Switching the type also rewrites the title and the invoice number toggle.
    pub fn with_document_type(&self, document_type: DocumentType) -> Self {
        Self {
            document_type,
            title: document_type.title().to_string(),
            visibility: self
                .visibility
                .with(Block::InvoiceNo, document_type == DocumentType::Tax),
            ..self.clone()
        }
    }

    /// Appends a blank item with a fresh id; returns the new document and that id.
    pub fn with_new_item(&self) -> (Self, String) {
        let id = self.fresh_item_id();
        let mut items = self.items.clone();
        items.push(LineItem::blank(id.clone()));
        (Self { items, ..self.clone() }, id)
    }

    /// Replaces the item carrying `item.id`. Unknown ids, and items with a
    /// value or rate outside [`is_valid_amount`], leave the list as is.
    pub fn with_item(&self, item: LineItem) -> Self {
        if !is_valid_amount(item.value) || !is_valid_amount(item.tax_rate_percent) {
            warn!(id = %item.id, value = item.value, rate = item.tax_rate_percent, "rejected item edit");
            return self.clone();
        }
        let items = self
            .items
            .iter()
            .map(|existing| if existing.id == item.id { item.clone() } else { existing.clone() })
            .collect();
        Self { items, ..self.clone() }
    }

    pub fn without_item(&self, id: &str) -> Self {
        let items = self.items.iter().filter(|i| i.id != id).cloned().collect();
        Self { items, ..self.clone() }
    }

    pub fn item(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Short random id, re-rolled until it is unused in this document.
    fn fresh_item_id(&self) -> String {
        loop {
            let candidate = Uuid::new_v4().simple().to_string()[..8].to_string();
            if self.item(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// The invoice number block is shown only for tax invoices with the toggle on.
    pub fn shows_invoice_no(&self) -> bool {
        self.visibility.invoice_no && self.document_type != DocumentType::Proforma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proforma_forces_title_and_hides_invoice_no() {
        let doc = Document::default().with_document_type(DocumentType::Tax);
        assert_eq!(doc.title, TAX_TITLE);
        assert!(doc.visibility.invoice_no);
        assert!(doc.shows_invoice_no());

        let back = doc.with_document_type(DocumentType::Proforma);
        assert_eq!(back.title, PROFORMA_TITLE);
        assert!(!back.visibility.invoice_no);
        assert!(!back.shows_invoice_no());
    }

    #[test]
    fn proforma_gate_applies_even_when_toggle_is_on() {
        let doc = Document::default().with_visibility(Block::InvoiceNo, true);
        assert_eq!(doc.document_type, DocumentType::Proforma);
        assert!(!doc.shows_invoice_no());
    }

    #[test]
    fn setters_do_not_touch_the_original() {
        let original = Document::default();
        let edited = original.with_title("Quote").without_item("1");
        assert_eq!(original.title, PROFORMA_TITLE);
        assert_eq!(original.items.len(), 1);
        assert_eq!(edited.title, "Quote");
        assert!(edited.items.is_empty());
    }

    #[test]
    fn new_items_get_unique_ids_and_keep_order() {
        let (doc, first) = Document::default().with_new_item();
        let (doc, second) = doc.with_new_item();
        assert_ne!(first, second);
        let ids: Vec<&str> = doc.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", first.as_str(), second.as_str()]);
    }

    #[test]
    fn with_item_replaces_by_id() {
        let doc = Document::default();
        let mut item = doc.items[0].clone();
        item.value = 250.0;
        let doc = doc.with_item(item);
        assert_eq!(doc.item("1").map(|i| i.value), Some(250.0));
    }

    #[test]
    fn with_item_rejects_unusable_amounts() {
        let doc = Document::default();
        for (value, rate) in [(f64::INFINITY, 18.0), (f64::NAN, 18.0), (100.0, -100.0), (-1.0, 18.0)] {
            let mut item = doc.items[0].clone();
            item.value = value;
            item.tax_rate_percent = rate;
            assert_eq!(doc.with_item(item), doc);
        }
        assert!(is_valid_amount(0.0));
        assert!(!is_valid_amount(f64::NEG_INFINITY));
    }

    #[test]
    fn removing_last_item_is_legal() {
        let doc = Document::default().without_item("1");
        assert!(doc.items.is_empty());
        // unknown ids are a no-op
        assert!(doc.without_item("nope").items.is_empty());
    }

    #[test]
    fn visibility_toggle_by_block() {
        let vis = Visibility::default().with(Block::Bank, false);
        assert!(!vis.get(Block::Bank));
        assert!(vis.get(Block::Logo));
    }
}
